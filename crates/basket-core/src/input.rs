//! Line-oriented record reader.
//!
//! Each non-blank line is `basket_id,product_id`. Surrounding whitespace is
//! trimmed; the basket id is everything before the first comma. A line that
//! is not UTF-8 is a malformed record like any other unparsable line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::basket::{ItemId, Record};
use crate::error::{CoreError, Result};

/// Iterator of records parsed from a buffered reader.
pub struct RecordReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }

    /// Number of lines consumed so far, blank lines included.
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl RecordReader<BufReader<File>> {
    /// Open a record file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(CoreError::Input)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(CoreError::Input(e))),
            }
            self.line += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => return Some(Err(CoreError::malformed(self.line, e.to_string()))),
            };
            if line.is_empty() {
                continue;
            }
            return Some(parse_record(line, self.line));
        }
    }
}

/// Parse one trimmed, non-empty line.
pub fn parse_record(line: &str, line_no: u64) -> Result<Record> {
    let (basket, item) = line
        .split_once(',')
        .ok_or_else(|| CoreError::malformed(line_no, "expected 'basket_id,product_id'"))?;
    let basket = basket.trim();
    if basket.is_empty() {
        return Err(CoreError::malformed(line_no, "empty basket id"));
    }
    let item = item.trim();
    let item: ItemId = item
        .parse()
        .map_err(|e| CoreError::malformed(line_no, format!("product id '{}': {}", item, e)))?;
    Ok(Record::new(basket, item))
}

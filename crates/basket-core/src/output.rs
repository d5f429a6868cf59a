//! Output table writer.
//!
//! Rows are written to a temporary file next to the destination and moved
//! into place by [`PairTableWriter::commit`]. Dropping the writer without
//! committing deletes the temporary file, so a failed run never leaves a
//! truncated table at the destination.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::basket::PairKey;
use crate::error::{CoreError, Result};

/// Header line of the output table.
pub const OUTPUT_HEADER: &str = "product_1,product_2,# baskets";

/// Writes `product_1,product_2,# baskets` rows and publishes them atomically.
pub struct PairTableWriter {
    path: PathBuf,
    writer: BufWriter<NamedTempFile>,
    rows: u64,
}

impl PairTableWriter {
    /// Start a table destined for `path` and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| CoreError::output(path, e))?;
        let temp = tempfile::Builder::new()
            .prefix(".basket-pairs-")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(|e| CoreError::output(path, e))?;

        let mut table = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(temp),
            rows: 0,
        };
        writeln!(table.writer, "{}", OUTPUT_HEADER).map_err(|e| CoreError::output(path, e))?;
        Ok(table)
    }

    /// Append one row.
    pub fn write_row(&mut self, key: PairKey, count: u64) -> Result<()> {
        writeln!(self.writer, "{},{},{}", key.a(), key.b(), count)
            .map_err(|e| CoreError::output(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, sync, and move the table to its destination.
    pub fn commit(self) -> Result<u64> {
        let Self { path, writer, rows } = self;
        let temp = writer
            .into_inner()
            .map_err(|e| CoreError::output(&path, e.into_error()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| CoreError::output(&path, e))?;
        temp.persist(&path)
            .map_err(|e| CoreError::output(&path, e.error))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_publishes_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = PairTableWriter::create(&path).unwrap();
        table.write_row(PairKey::new(1, 2), 2).unwrap();
        table.write_row(PairKey::new(3, 1), 1).unwrap();
        assert!(!path.exists());
        assert_eq!(table.commit().unwrap(), 2);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "product_1,product_2,# baskets\n1,2,2\n1,3,1\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_drop_without_commit_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "previous").unwrap();

        let mut table = PairTableWriter::create(&path).unwrap();
        table.write_row(PairKey::new(1, 2), 1).unwrap();
        drop(table);

        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_creates_missing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        PairTableWriter::create(&path).unwrap().commit().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{}\n", OUTPUT_HEADER)
        );
    }
}

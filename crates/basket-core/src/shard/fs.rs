//! File-system shard store.
//!
//! One file per shard inside a run directory. Appends go through a bounded
//! LRU of open buffered handles so hot shards do not reopen their file on
//! every eviction from the aggregation cache. Any operation that inspects a
//! shard's file first flushes that shard's handle.

use lru::LruCache;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, trace};

use super::router::ShardId;
use super::store::{ShardReader, ShardStore, Triple};
use crate::error::{CoreError, Result};

const RUN_DIR_PREFIX: &str = "basket-shards-";

/// Shard store backed by one text file per shard.
pub struct FsShardStore {
    root: PathBuf,
    writers: LruCache<ShardId, BufWriter<File>>,
    scratch: String,
    /// Owned run directory, removed on drop after the handles close
    run_dir: Option<TempDir>,
}

impl FsShardStore {
    /// Create a store in a fresh, uniquely named directory under `parent`.
    ///
    /// The directory and every shard in it are deleted when the store is
    /// dropped, so concurrent runs sharing `parent` never see each other's
    /// shards.
    pub fn create_in(parent: &Path, max_open: usize) -> Result<Self> {
        fs::create_dir_all(parent)
            .map_err(|e| CoreError::storage("create", parent.display(), e))?;
        let run_dir = tempfile::Builder::new()
            .prefix(RUN_DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| CoreError::storage("create", parent.display(), e))?;
        debug!("Created shard directory {}", run_dir.path().display());

        let mut store = Self::open(run_dir.path(), max_open)?;
        store.run_dir = Some(run_dir);
        Ok(store)
    }

    /// Use `root` as the shard directory, creating it if needed.
    ///
    /// The caller owns the directory; nothing is removed on drop.
    pub fn open(root: &Path, max_open: usize) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| CoreError::storage("create", root.display(), e))?;
        let max_open = NonZeroUsize::new(max_open).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root: root.to_path_buf(),
            run_dir: None,
            writers: LruCache::new(max_open),
            scratch: String::new(),
        })
    }

    /// Directory holding the shard files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of shard files currently open for appending.
    pub fn open_handles(&self) -> usize {
        self.writers.len()
    }

    fn path_for(&self, shard: ShardId) -> PathBuf {
        self.root.join(shard.file_name())
    }

    fn open_writer(&mut self, shard: ShardId) -> Result<()> {
        let path = self.path_for(shard);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::storage("open", shard, e))?;
        if let Some((evicted, mut writer)) = self.writers.push(shard, BufWriter::new(file)) {
            trace!("Closing shard handle {}", evicted);
            writer
                .flush()
                .map_err(|e| CoreError::storage("append", evicted, e))?;
        }
        Ok(())
    }

    /// Flush and close the handle for `shard`, if one is open.
    fn close_writer(&mut self, shard: ShardId) -> Result<()> {
        if let Some(mut writer) = self.writers.pop(&shard) {
            writer
                .flush()
                .map_err(|e| CoreError::storage("append", shard, e))?;
        }
        Ok(())
    }
}

impl ShardStore for FsShardStore {
    fn append(&mut self, shard: ShardId, triple: Triple) -> Result<()> {
        if !self.writers.contains(&shard) {
            self.open_writer(shard)?;
        }
        self.scratch.clear();
        triple.encode_into(&mut self.scratch);
        let writer = self.writers.get_mut(&shard).ok_or_else(|| {
            CoreError::storage("append", shard, std::io::Error::other("handle not open"))
        })?;
        writer
            .write_all(self.scratch.as_bytes())
            .map_err(|e| CoreError::storage("append", shard, e))
    }

    fn size(&mut self, shard: ShardId) -> Result<u64> {
        self.close_writer(shard)?;
        match fs::metadata(self.path_for(shard)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CoreError::storage("size", shard, e)),
        }
    }

    fn list_ids(&mut self) -> Result<BTreeSet<ShardId>> {
        let entries =
            fs::read_dir(&self.root).map_err(|e| CoreError::storage("list", self.root.display(), e))?;
        let mut ids = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::storage("list", self.root.display(), e))?;
            if let Some(id) = entry.file_name().to_str().and_then(ShardId::from_file_name) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    fn read(&mut self, shard: ShardId) -> Result<ShardReader> {
        self.close_writer(shard)?;
        let file = match File::open(self.path_for(shard)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty::<Result<Triple>>()))
            }
            Err(e) => return Err(CoreError::storage("read", shard, e)),
        };
        let lines = BufReader::new(file).lines();
        Ok(Box::new(lines.map(move |line| {
            let line = line.map_err(|e| CoreError::storage("read", shard, e))?;
            Triple::decode(&line, shard)
        })))
    }

    fn rename(&mut self, from: ShardId, to: ShardId) -> Result<()> {
        self.close_writer(from)?;
        self.close_writer(to)?;
        fs::rename(self.path_for(from), self.path_for(to))
            .map_err(|e| CoreError::storage("rename", from, e))
    }

    fn remove(&mut self, shard: ShardId) -> Result<()> {
        // Content is being discarded; skip the flush
        self.writers.pop(&shard);
        match fs::remove_file(self.path_for(shard)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::storage("remove", shard, e)),
        }
    }

    fn sync(&mut self) -> Result<()> {
        while let Some((shard, mut writer)) = self.writers.pop_lru() {
            writer
                .flush()
                .map_err(|e| CoreError::storage("sync", shard, e))?;
            writer
                .get_ref()
                .sync_data()
                .map_err(|e| CoreError::storage("sync", shard, e))?;
        }
        Ok(())
    }
}

impl Drop for FsShardStore {
    fn drop(&mut self) {
        // Best effort for caller-owned directories; an owned run directory is
        // deleted right after.
        if self.run_dir.is_none() {
            let _ = self.sync();
        }
    }
}

//! SQLite reference pipeline.
//!
//! Loads every record into a `baskets` table and lets SQLite do the pairing
//! with a self-join. Useful as a cross-check for the sharded engine and as a
//! point of comparison for run time. Unlike the engine it groups baskets by
//! id across the whole input and never reports self-pairs.

use rusqlite::{params, Connection, Result as SqliteResult};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::basket::{ItemId, PairKey, Record};
use crate::error::{CoreError, Result};

const SCHEMA_CREATE_BASKETS: &str = "
    DROP TABLE IF EXISTS baskets;
    CREATE TABLE baskets (
        basket_id TEXT NOT NULL,
        product_id INTEGER NOT NULL
    );
";

const INSERT_RECORD: &str = "INSERT INTO baskets (basket_id, product_id) VALUES (?1, ?2)";

const PAIR_COUNT_QUERY: &str = "
    SELECT p1.product_id, p2.product_id, COUNT(*)
    FROM baskets AS p1
    INNER JOIN baskets AS p2 ON p1.basket_id = p2.basket_id
    WHERE p1.product_id < p2.product_id
    GROUP BY p1.product_id, p2.product_id
";

/// Counters for one baseline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BaselineStats {
    pub records: u64,
    pub batches: u64,
    pub output_rows: u64,
    pub elapsed_ms: u64,
}

/// Pair counter backed by an embedded SQLite database.
pub struct BaselineCounter {
    conn: Connection,
    batch_size: usize,
}

impl BaselineCounter {
    /// Open (or create) a database file and reset its `baskets` table.
    pub fn open(path: &Path, cache_capacity: usize, row_bytes: u64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, cache_capacity, row_bytes)
    }

    /// Use a private in-memory database.
    pub fn in_memory(cache_capacity: usize, row_bytes: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, cache_capacity, row_bytes)
    }

    fn with_connection(conn: Connection, cache_capacity: usize, row_bytes: u64) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(CoreError::CapacityMisconfiguration {
                capacity: cache_capacity,
            });
        }
        if row_bytes == 0 {
            return Err(CoreError::InvalidRowSize);
        }
        Self::configure_connection(&conn, cache_capacity, row_bytes)?;
        conn.execute_batch(SCHEMA_CREATE_BASKETS)?;
        Ok(Self {
            conn,
            batch_size: cache_capacity,
        })
    }

    fn configure_connection(
        conn: &Connection,
        cache_capacity: usize,
        row_bytes: u64,
    ) -> SqliteResult<()> {
        // Negative cache_size is a budget in KiB rather than pages
        let budget_kib = (cache_capacity as u64).saturating_mul(row_bytes) / 1000;
        conn.pragma_update(None, "cache_size", -(budget_kib.max(1) as i64))?;
        conn.pragma_update(None, "temp_store", "FILE")?;
        Ok(())
    }

    /// Load `records`, run the pairing query, and emit one row per pair.
    pub fn run<I, F>(&self, records: I, mut emit: F) -> Result<BaselineStats>
    where
        I: IntoIterator<Item = Result<Record>>,
        F: FnMut(PairKey, u64) -> Result<()>,
    {
        let started = Instant::now();
        let mut stats = BaselineStats::default();
        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);

        for record in records {
            batch.push(record?);
            stats.records += 1;
            if batch.len() >= self.batch_size {
                self.insert_batch(&batch)?;
                stats.batches += 1;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.insert_batch(&batch)?;
            stats.batches += 1;
        }
        info!(
            "Loaded {} records in {} batch(es)",
            stats.records, stats.batches
        );

        let mut stmt = self.conn.prepare(PAIR_COUNT_QUERY)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, ItemId>(0)?,
                row.get::<_, ItemId>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (a, b, count) = row?;
            emit(PairKey::new(a, b), count as u64)?;
            stats.output_rows += 1;
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Baseline produced {} pair(s) in {} ms",
            stats.output_rows, stats.elapsed_ms
        );
        Ok(stats)
    }

    fn insert_batch(&self, batch: &[Record]) -> SqliteResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_RECORD)?;
            for record in batch {
                stmt.execute(params![record.basket, record.item])?;
            }
        }
        tx.commit()?;
        debug!("Committed batch of {} records", batch.len());
        Ok(())
    }
}

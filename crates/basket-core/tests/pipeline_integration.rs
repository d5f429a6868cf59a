//! End-to-end tests for the pair counting pipeline
//!
//! Runs the full bucketize/split/merge pipeline over both shard stores and
//! checks the result against a direct in-memory count.

use basket_core::{
    FsShardStore, MemoryShardStore, MergeStats, PairCounter, PairTableWriter, Record,
    RecordReader, RunStats, ShardStore, SplitStats,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;
use tempfile::TempDir;

type Rows = BTreeMap<(u32, u32), u64>;

const ROW_BYTES: u64 = 100;

/// Count pairs directly, one contiguous basket at a time.
fn brute_force(records: &[Record]) -> Rows {
    let mut rows = Rows::new();
    let mut start = 0;
    while start < records.len() {
        let mut end = start + 1;
        while end < records.len() && records[end].basket == records[start].basket {
            end += 1;
        }
        let items: Vec<u32> = records[start..end].iter().map(|r| r.item).collect();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let key = (items[i].min(items[j]), items[i].max(items[j]));
                *rows.entry(key).or_default() += 1;
            }
        }
        start = end;
    }
    rows
}

fn run_with<S: ShardStore>(
    records: &[Record],
    capacity: usize,
    row_bytes: u64,
    store: &mut S,
) -> (Rows, RunStats) {
    let counter = PairCounter::new(capacity, row_bytes).unwrap();
    let mut rows = Rows::new();
    let stats = counter
        .run(records.iter().cloned().map(Ok), store, |key, count| {
            let previous = rows.insert((key.a(), key.b()), count);
            assert!(previous.is_none(), "pair {} emitted twice", key);
            Ok(())
        })
        .unwrap();
    (rows, stats)
}

fn run_in_memory(records: &[Record], capacity: usize) -> (Rows, RunStats) {
    run_with(records, capacity, ROW_BYTES, &mut MemoryShardStore::new())
}

/// Deterministic pseudo-random baskets (xorshift).
fn synthetic(baskets: usize, max_items: u64, products: u64, seed: u64) -> Vec<Record> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut records = Vec::new();
    for basket in 0..baskets {
        let len = 1 + next() % max_items;
        for _ in 0..len {
            records.push(Record::new(format!("order-{}", basket), (next() % products) as u32));
        }
    }
    records
}

fn records(pairs: &[(&str, u32)]) -> Vec<Record> {
    pairs.iter().map(|(b, i)| Record::new(*b, *i)).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_two_baskets_scenario() {
    let input = records(&[("A", 1), ("A", 2), ("B", 1), ("B", 2), ("B", 3)]);
    let (rows, _) = run_in_memory(&input, 2);
    let expected: Rows = [((1, 2), 2), ((1, 3), 1), ((2, 3), 1)].into_iter().collect();
    assert_eq!(rows, expected);
}

#[test]
fn test_duplicate_item_scenario() {
    let input = records(&[("A", 1), ("A", 2), ("A", 2)]);
    let (rows, _) = run_in_memory(&input, 1);
    let expected: Rows = [((1, 2), 2), ((2, 2), 1)].into_iter().collect();
    assert_eq!(rows, expected);
}

#[test]
fn test_non_contiguous_basket_counted_twice() {
    let input = records(&[("A", 1), ("A", 2), ("B", 9), ("A", 1), ("A", 2)]);
    let (rows, stats) = run_in_memory(&input, 4);
    assert_eq!(stats.baskets, 3);
    assert_eq!(rows.get(&(1, 2)), Some(&2));
}

// ============================================================================
// Conservation and Capacity Invariance
// ============================================================================

#[test]
fn test_capacity_invariance() {
    let input = synthetic(200, 8, 40, 7);
    let expected = brute_force(&input);

    for capacity in [1, 2, 1000] {
        let (rows, _) = run_in_memory(&input, capacity);
        assert_eq!(rows, expected, "capacity {}", capacity);
    }
}

#[test]
fn test_fs_store_matches_memory_store() {
    let input = synthetic(300, 10, 60, 42);
    let expected = brute_force(&input);
    let temp = TempDir::new().unwrap();

    for (capacity, max_open) in [(1, 1), (3, 8), (5, 1)] {
        let mut store = FsShardStore::create_in(temp.path(), max_open).unwrap();
        let (rows, stats) = run_with(&input, capacity, 10, &mut store);
        assert_eq!(rows, expected, "capacity {}", capacity);
        assert!(stats.shards_written > 0);
        assert!(stats.shards_split > 0, "capacity {} never split", capacity);
        assert!(store.list_ids().unwrap().is_empty());
    }
}

#[test]
fn test_small_budget_forces_splits() {
    let input = synthetic(150, 12, 30, 99);
    let expected = brute_force(&input);

    let (rows, stats) = run_with(&input, 2, 4, &mut MemoryShardStore::new());
    assert_eq!(rows, expected);
    assert!(stats.shards_split > 0);
    assert_eq!(stats.output_rows, expected.len() as u64);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_counts_are_exact(
        baskets in proptest::collection::vec(
            proptest::collection::vec(0u32..20, 0..6),
            0..30,
        ),
        capacity in 1usize..8,
    ) {
        let input: Vec<Record> = baskets
            .iter()
            .enumerate()
            .flat_map(|(i, items)| items.iter().map(move |&item| Record::new(i.to_string(), item)))
            .collect();
        let (rows, _) = run_in_memory(&input, capacity);
        prop_assert_eq!(rows, brute_force(&input));
    }
}

// ============================================================================
// Reader to Writer
// ============================================================================

#[test]
fn test_reader_to_table() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("pairs.csv");
    let text = "A,1\nA,2\n\nB,1\nB,2\nB,3\n";

    let counter = PairCounter::new(2, ROW_BYTES).unwrap();
    let mut store = FsShardStore::create_in(&temp.path().join("cache"), 4).unwrap();
    let mut table = PairTableWriter::create(&output).unwrap();
    counter
        .run(
            RecordReader::new(Cursor::new(text)),
            &mut store,
            |key, count| table.write_row(key, count),
        )
        .unwrap();
    table.commit().unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.remove(0), "product_1,product_2,# baskets");
    lines.sort();
    assert_eq!(lines, vec!["1,2,2", "1,3,1", "2,3,1"]);
}

#[test]
fn test_malformed_input_leaves_no_output() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("pairs.csv");

    let counter = PairCounter::new(2, ROW_BYTES).unwrap();
    let mut store = MemoryShardStore::new();
    let mut table = PairTableWriter::create(&output).unwrap();
    let result = counter.run(
        RecordReader::new(Cursor::new("A,1\nA,oops\n")),
        &mut store,
        |key, count| table.write_row(key, count),
    );
    assert!(result.is_err());
    drop(table);

    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

// ============================================================================
// Stats Serialization
// ============================================================================

#[test]
fn test_stats_serialize_with_stable_field_names() {
    let input = records(&[("A", 1), ("A", 2), ("B", 1), ("B", 2), ("B", 3)]);
    let (_, stats) = run_in_memory(&input, 2);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["records"], 5);
    assert_eq!(json["baskets"], 2);
    assert_eq!(json["pair_updates"], 4);
    assert_eq!(json["output_rows"], 3);
    for field in [
        "cache_hits",
        "cache_misses",
        "cache_evictions",
        "initial_scale",
        "shards_written",
        "shards_split",
        "oversized_shards",
        "bucketize_ms",
        "split_ms",
        "merge_ms",
        "elapsed_ms",
    ] {
        assert!(json[field].is_u64(), "missing {}", field);
    }

    let split = serde_json::to_value(SplitStats::default()).unwrap();
    assert_eq!(
        split,
        serde_json::json!({
            "checked": 0,
            "split": 0,
            "children": 0,
            "oversized": 0,
            "finest_scale": null,
        })
    );

    let merged = serde_json::to_value(MergeStats::default()).unwrap();
    assert_eq!(
        merged,
        serde_json::json!({ "shards": 0, "triples": 0, "rows": 0 })
    );
}

//! Basket grouping and pair expansion.
//!
//! Input records arrive as `(basket id, item id)`. Records of one basket must
//! be contiguous in the stream; the accumulator closes a basket whenever the
//! id changes and does not check whether an id shows up again later. A
//! reappearing id is counted as a separate basket.

use std::fmt;

/// Product identifier.
pub type ItemId = u32;

/// One input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Opaque basket token
    pub basket: String,
    /// Product in the basket
    pub item: ItemId,
}

impl Record {
    pub fn new(basket: impl Into<String>, item: ItemId) -> Self {
        Self {
            basket: basket.into(),
            item,
        }
    }
}

/// Unordered product pair stored as `a <= b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    a: ItemId,
    b: ItemId,
}

impl PairKey {
    /// Build a key from two items in any order.
    pub fn new(x: ItemId, y: ItemId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    /// The smaller item.
    pub fn a(&self) -> ItemId {
        self.a
    }

    /// The larger item.
    pub fn b(&self) -> ItemId {
        self.b
    }

    /// True for a pair formed by the same item twice.
    pub fn is_self_pair(&self) -> bool {
        self.a == self.b
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.a, self.b)
    }
}

/// Items of one contiguous basket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    pub id: String,
    pub items: Vec<ItemId>,
}

impl Basket {
    /// Expand into every pair of item positions.
    pub fn pairs(self) -> Pairs {
        Pairs::new(self.items)
    }
}

/// Groups a record stream into baskets.
#[derive(Debug, Default)]
pub struct BasketAccumulator {
    current: Option<String>,
    items: Vec<ItemId>,
}

impl BasketAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record.
    ///
    /// Returns the previous basket when `record` starts a new one.
    pub fn push(&mut self, record: Record) -> Option<Basket> {
        match self.current {
            Some(ref id) if *id == record.basket => {
                self.items.push(record.item);
                None
            }
            _ => {
                let finished = self.take();
                self.current = Some(record.basket);
                self.items.push(record.item);
                finished
            }
        }
    }

    /// Close the stream, returning the last open basket.
    pub fn finish(mut self) -> Option<Basket> {
        self.take()
    }

    fn take(&mut self) -> Option<Basket> {
        self.current.take().map(|id| Basket {
            id,
            items: std::mem::take(&mut self.items),
        })
    }
}

/// Lazy iterator over all pairs `(items[i], items[j])`, `i < j`, of a sorted
/// item list.
///
/// Duplicate items are kept, so `[2, 2]` yields the self-pair `(2, 2)`.
#[derive(Debug, Clone)]
pub struct Pairs {
    items: Vec<ItemId>,
    i: usize,
    j: usize,
}

impl Pairs {
    pub fn new(mut items: Vec<ItemId>) -> Self {
        items.sort_unstable();
        Self { items, i: 0, j: 1 }
    }

    /// Number of pairs a basket of `n` items produces.
    pub fn count_for(n: usize) -> usize {
        n * n.saturating_sub(1) / 2
    }
}

impl Iterator for Pairs {
    type Item = PairKey;

    fn next(&mut self) -> Option<PairKey> {
        if self.j >= self.items.len() {
            self.i += 1;
            self.j = self.i + 1;
            if self.j >= self.items.len() {
                return None;
            }
        }
        let key = PairKey {
            a: self.items[self.i],
            b: self.items[self.j],
        };
        self.j += 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.items.len();
        if self.i >= n {
            return (0, Some(0));
        }
        let rest_of_row = n.saturating_sub(self.j);
        let tail = n - self.i - 1;
        let remaining = rest_of_row + Self::count_for(tail);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pairs {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(items: &[ItemId]) -> Vec<(ItemId, ItemId)> {
        Pairs::new(items.to_vec()).map(|k| (k.a(), k.b())).collect()
    }

    #[test]
    fn test_pair_key_orders_items() {
        let key = PairKey::new(9, 4);
        assert_eq!(key.a(), 4);
        assert_eq!(key.b(), 9);
        assert_eq!(key, PairKey::new(4, 9));
        assert!(PairKey::new(3, 3).is_self_pair());
        assert_eq!(key.to_string(), "4,9");
    }

    #[test]
    fn test_pairs_sorted_expansion() {
        assert_eq!(collect(&[3, 1, 2]), vec![(1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_pairs_keep_duplicates() {
        assert_eq!(collect(&[2, 1, 2]), vec![(1, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_pairs_small_baskets() {
        assert!(collect(&[]).is_empty());
        assert!(collect(&[42]).is_empty());
        assert_eq!(collect(&[5, 5]), vec![(5, 5)]);
    }

    #[test]
    fn test_pairs_exact_size() {
        let mut pairs = Pairs::new((0..10).collect());
        assert_eq!(pairs.len(), 45);
        pairs.next();
        pairs.next();
        assert_eq!(pairs.len(), 43);
        assert_eq!(pairs.count(), 43);
        assert_eq!(Pairs::count_for(0), 0);
        assert_eq!(Pairs::count_for(1), 0);
        assert_eq!(Pairs::count_for(4), 6);
    }

    #[test]
    fn test_accumulator_groups_contiguous_records() {
        let mut acc = BasketAccumulator::new();
        assert_eq!(acc.push(Record::new("A", 1)), None);
        assert_eq!(acc.push(Record::new("A", 2)), None);

        let first = acc.push(Record::new("B", 1)).unwrap();
        assert_eq!(first.id, "A");
        assert_eq!(first.items, vec![1, 2]);

        assert_eq!(acc.push(Record::new("B", 3)), None);
        let last = acc.finish().unwrap();
        assert_eq!(last.id, "B");
        assert_eq!(last.items, vec![1, 3]);
    }

    #[test]
    fn test_accumulator_empty_stream() {
        assert_eq!(BasketAccumulator::new().finish(), None);
    }

    #[test]
    fn test_accumulator_non_contiguous_ids_split() {
        let mut acc = BasketAccumulator::new();
        let mut baskets = Vec::new();
        for record in [
            Record::new("A", 1),
            Record::new("B", 2),
            Record::new("A", 3),
        ] {
            baskets.extend(acc.push(record));
        }
        baskets.extend(acc.finish());

        let ids: Vec<&str> = baskets.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "A"]);
    }
}

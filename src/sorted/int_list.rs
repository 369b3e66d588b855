use crate::types::RunNumber;

/// Sorted growable sequence of run numbers with binary-search queries.
///
/// Grows within a single index-build pass and is never pruned; duplicates
/// are kept adjacent. Queries are O(log n), insertion is O(n) on the backing
/// array, which is fine because the list is rebuilt rarely and read often.
#[derive(Debug, Clone, Default)]
pub struct SortedIntList {
    data: Vec<RunNumber>,
}

impl SortedIntList {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Insert `v` before the first element >= `v`, keeping the order.
    pub fn add(&mut self, v: RunNumber) {
        let at = self.ceil(v);
        self.data.insert(at, v);
    }

    /// Number of elements strictly less than `v` — equivalently, the index
    /// where `v` would be inserted.
    pub fn ceil(&self, v: RunNumber) -> usize {
        self.data.partition_point(|&x| x < v)
    }

    /// Index of the last element strictly less than `v`, if any.
    pub fn lower(&self, v: RunNumber) -> Option<usize> {
        self.ceil(v).checked_sub(1)
    }

    /// Greatest stored number, or 0 when empty. Run numbers start at 1, so 0
    /// doubles as the "no data" answer.
    pub fn max(&self) -> RunNumber {
        self.data.last().copied().unwrap_or(0)
    }

    pub fn contains(&self, v: RunNumber) -> bool {
        self.data.binary_search(&v).is_ok()
    }

    pub fn get(&self, i: usize) -> Option<RunNumber> {
        self.data.get(i).copied()
    }

    pub fn is_in_range(&self, i: usize) -> bool {
        i < self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RunNumber> + '_ {
        self.data.iter().copied()
    }
}

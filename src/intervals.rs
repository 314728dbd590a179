//! Sorted interval containers with binary-search overlap queries.
//!
//! An [`IntervalArray`] keeps its intervals sorted by start (then end) next to a
//! running maximum of the end coordinates. Because that running maximum never
//! decreases, the first interval that can overlap a query is found with one
//! binary search; the scan then stops at the first interval starting past the
//! query end.

/// Anything with a closed genomic span.
pub trait Span {
    fn start(&self) -> i32;
    fn end(&self) -> i32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval<T> {
    pub start: i32,
    pub end: i32,
    pub value: T,
}

impl<T> Interval<T> {
    #[must_use]
    pub fn new(start: i32, end: i32, value: T) -> Self {
        Self { start, end, value }
    }

    #[must_use]
    pub fn overlaps(&self, start: i32, end: i32) -> bool {
        self.start <= end && self.end >= start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalArray<T> {
    intervals: Vec<Interval<T>>,
    max_ends: Vec<i32>,
}

impl<T> Default for IntervalArray<T> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
            max_ends: Vec::new(),
        }
    }
}

impl<T> IntervalArray<T> {
    /// Builds the array. Intervals are stably sorted by (start, end), so equal
    /// spans keep their input order.
    #[must_use]
    pub fn new(mut intervals: Vec<Interval<T>>) -> Self {
        intervals.sort_by_key(|iv| (iv.start, iv.end));

        let mut max_ends = Vec::with_capacity(intervals.len());
        let mut max_end = i32::MIN;
        for iv in &intervals {
            max_end = max_end.max(iv.end);
            max_ends.push(max_end);
        }

        Self {
            intervals,
            max_ends,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval<T>> {
        self.intervals.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.intervals.iter().map(|iv| &iv.value)
    }

    /// All intervals overlapping the closed range `[start, end]`, in sorted order.
    pub fn overlapping(&self, start: i32, end: i32) -> impl Iterator<Item = &Interval<T>> {
        let first = self.max_ends.partition_point(|&max_end| max_end < start);
        self.intervals[first..]
            .iter()
            .take_while(move |iv| iv.start <= end)
            .filter(move |iv| iv.overlaps(start, end))
    }

    #[must_use]
    pub fn overlapping_values(&self, start: i32, end: i32) -> Vec<&T> {
        self.overlapping(start, end).map(|iv| &iv.value).collect()
    }

    #[must_use]
    pub fn first_overlapping(&self, start: i32, end: i32) -> Option<&Interval<T>> {
        self.overlapping(start, end).next()
    }

    #[must_use]
    pub fn overlaps_any(&self, start: i32, end: i32) -> bool {
        self.first_overlapping(start, end).is_some()
    }

    /// Intervals that fully contain `[start, end]`.
    pub fn containing(&self, start: i32, end: i32) -> impl Iterator<Item = &Interval<T>> {
        self.overlapping(start, end)
            .filter(move |iv| iv.start <= start && iv.end >= end)
    }
}

impl<T: Span> IntervalArray<T> {
    /// Builds an array whose spans come from the values themselves.
    #[must_use]
    pub fn from_values(values: Vec<T>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|v| Interval::new(v.start(), v.end(), v))
                .collect(),
        )
    }
}

/// One [`IntervalArray`] per reference sequence, addressed by ref index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalForest<T> {
    arrays: Vec<IntervalArray<T>>,
}

impl<T> IntervalForest<T> {
    #[must_use]
    pub fn new(arrays: Vec<IntervalArray<T>>) -> Self {
        Self { arrays }
    }

    #[must_use]
    pub fn num_refs(&self) -> usize {
        self.arrays.len()
    }

    #[must_use]
    pub fn get(&self, ref_index: u16) -> Option<&IntervalArray<T>> {
        self.arrays.get(usize::from(ref_index))
    }

    pub fn arrays(&self) -> &[IntervalArray<T>] {
        &self.arrays
    }

    #[must_use]
    pub fn overlapping_values(&self, ref_index: u16, start: i32, end: i32) -> Vec<&T> {
        self.get(ref_index)
            .map(|array| array.overlapping_values(start, end))
            .unwrap_or_default()
    }
}

impl<T: Span> IntervalForest<T> {
    /// Groups items by ref index into `num_refs` arrays. Items whose ref index
    /// is out of range are returned as the error value.
    pub fn group(
        items: impl IntoIterator<Item = T>,
        num_refs: usize,
        ref_index: impl Fn(&T) -> u16,
    ) -> Result<Self, T> {
        let mut buckets: Vec<Vec<T>> = (0..num_refs).map(|_| Vec::new()).collect();
        for item in items {
            let i = usize::from(ref_index(&item));
            match buckets.get_mut(i) {
                Some(bucket) => bucket.push(item),
                None => return Err(item),
            }
        }
        Ok(Self::new(
            buckets.into_iter().map(IntervalArray::from_values).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntervalArray<&'static str> {
        IntervalArray::new(vec![
            Interval::new(50, 60, "c"),
            Interval::new(10, 100, "a"),
            Interval::new(20, 30, "b"),
            Interval::new(200, 210, "d"),
        ])
    }

    #[test]
    fn sorted_by_start_then_end() {
        let array = sample();
        let order: Vec<_> = array.values().copied().collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn overlap_query_sees_long_earlier_interval() {
        let array = sample();
        // "a" starts well before 70 but still spans it
        assert_eq!(array.overlapping_values(70, 80), vec![&"a"]);
        assert_eq!(array.overlapping_values(25, 55), vec![&"a", &"b", &"c"]);
        assert_eq!(array.overlapping_values(205, 205), vec![&"d"]);
        assert!(array.overlapping_values(101, 199).is_empty());
        assert!(array.overlapping_values(1, 9).is_empty());
    }

    #[test]
    fn boundaries_are_inclusive() {
        let array = sample();
        assert_eq!(array.overlapping_values(210, 300), vec![&"d"]);
        assert_eq!(array.overlapping_values(0, 10), vec![&"a"]);
    }

    #[test]
    fn containment() {
        let array = sample();
        let containing: Vec<_> = array.containing(22, 28).map(|iv| iv.value).collect();
        assert_eq!(containing, vec!["a", "b"]);
        let containing: Vec<_> = array.containing(95, 105).map(|iv| iv.value).collect();
        assert!(containing.is_empty());
    }

    #[test]
    fn empty_array() {
        let array: IntervalArray<u8> = IntervalArray::default();
        assert!(array.is_empty());
        assert!(!array.overlaps_any(0, i32::MAX));
    }

    #[derive(Debug, PartialEq)]
    struct Feature {
        chrom: u16,
        start: i32,
        end: i32,
    }

    impl Span for Feature {
        fn start(&self) -> i32 {
            self.start
        }
        fn end(&self) -> i32 {
            self.end
        }
    }

    #[test]
    fn forest_groups_by_reference() {
        let features = vec![
            Feature { chrom: 1, start: 5, end: 9 },
            Feature { chrom: 0, start: 1, end: 3 },
            Feature { chrom: 1, start: 1, end: 2 },
        ];
        let forest = IntervalForest::group(features, 3, |f| f.chrom).unwrap();

        assert_eq!(forest.num_refs(), 3);
        assert_eq!(forest.get(0).unwrap().len(), 1);
        assert_eq!(forest.get(1).unwrap().len(), 2);
        assert!(forest.get(2).unwrap().is_empty());
        assert_eq!(forest.overlapping_values(1, 6, 6).len(), 1);
        assert!(forest.overlapping_values(7, 1, 100).is_empty());
    }

    #[test]
    fn forest_rejects_unknown_reference() {
        let features = vec![Feature { chrom: 4, start: 1, end: 2 }];
        let rejected = IntervalForest::group(features, 2, |f| f.chrom).unwrap_err();
        assert_eq!(rejected.chrom, 4);
    }
}

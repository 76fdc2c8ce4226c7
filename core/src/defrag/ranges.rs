/// A set of non-overlapping, non-adjacent `[start, end)` byte ranges,
/// merged on insertion. Used to track which byte offsets of a fragmented
/// datagram have been received without needing a presence bitmap — folding
/// in a fragment and checking for completion are both cheap regardless of
/// arrival order, which is what makes the "any fragment permutation yields
/// the same result" property easy to satisfy.
#[derive(Debug, Default, Clone)]
pub struct IntervalSet {
    ranges: Vec<(u32, u32)>,
}

impl IntervalSet {
    pub fn new() -> IntervalSet {
        IntervalSet { ranges: Vec::new() }
    }

    /// Inserts `[start, end)`, merging with any overlapping or touching
    /// existing range. Returns `true` if this insertion overlapped an
    /// existing range (the caller decides what that means under the active
    /// overlap policy).
    pub fn insert(&mut self, start: u32, end: u32) -> bool {
        if start >= end {
            return false;
        }
        let mut overlapped = false;
        let insert_at = self.ranges.partition_point(|&(s, _)| s <= start);
        let mut lo = insert_at;
        // Check the range immediately before for adjacency/overlap too.
        if lo > 0 && self.ranges[lo - 1].1 >= start {
            lo -= 1;
        }
        let mut new_start = start;
        let mut new_end = end;
        let mut hi = lo;
        while hi < self.ranges.len() && self.ranges[hi].0 <= new_end {
            let (s, e) = self.ranges[hi];
            if s < new_end && e > new_start {
                overlapped = true;
            }
            new_start = new_start.min(s);
            new_end = new_end.max(e);
            hi += 1;
        }
        self.ranges.splice(lo..hi, [(new_start, new_end)]);
        overlapped
    }

    /// True if this set covers exactly `[0, total)` with no gaps. `total ==
    /// 0` is vacuously covered regardless of what's been inserted: there are
    /// no bytes to account for, and `insert` never records a zero-length
    /// range in the first place.
    pub fn covers(&self, total: u32) -> bool {
        if total == 0 {
            return true;
        }
        self.ranges.len() == 1 && self.ranges[0] == (0, total)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

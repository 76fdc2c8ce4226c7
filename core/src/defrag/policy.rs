pub use crate::config::FragmentPolicy;

/// Outcome of folding one fragment's bytes into a reassembly buffer under a
/// given [`FragmentPolicy`].
pub enum OverlapOutcome {
    /// No overlap occurred; bytes were written unconditionally.
    NoConflict,
    /// An overlap occurred and was resolved by overwriting with the new
    /// fragment's bytes (`LastWins`) or keeping the existing ones
    /// (`FirstWins`).
    Resolved,
    /// An overlap occurred and, under `DropOnConflict`, the whole fragment
    /// group must be discarded.
    MustDrop,
}

impl FragmentPolicy {
    /// Given that inserting a new fragment's range overlapped existing
    /// coverage, decides what to do. `write_new` tells the caller whether to
    /// copy the new fragment's bytes over the overlapped region.
    pub fn resolve_overlap(self, overlapped: bool) -> (OverlapOutcome, bool) {
        if !overlapped {
            return (OverlapOutcome::NoConflict, true);
        }
        match self {
            FragmentPolicy::LastWins => (OverlapOutcome::Resolved, true),
            FragmentPolicy::FirstWins => (OverlapOutcome::Resolved, false),
            FragmentPolicy::DropOnConflict => (OverlapOutcome::MustDrop, false),
        }
    }
}

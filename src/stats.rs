//! The statistics counter bag. A multi-threaded tree would want these
//! behind `AtomicU64`; this crate's scheduling model is single-threaded
//! cooperative, so counters are plain `u64` fields behind an
//! `Rc<RefCell<_>>` shared between a `Tree`/`Forest` and the `PagePool`
//! it drives.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a [`Stats`] bag, as returned by `Tree::new_with_stats`.
pub type SharedStats = Rc<RefCell<Stats>>;

/// Counters incremented by the pool and the tree. Never consulted by the
/// algorithm itself — purely observational.
#[derive(Default, Debug, Clone, Copy)]
pub struct Stats {
    pub insertions: u64,
    pub retrievals: u64,
    pub replacements: u64,
    pub removals: u64,
    pub finds: u64,
    pub grows: u64,
    pub page_allocations: u64,
    pub page_frees: u64,
    pub merge_attempts: u64,
    pub page_merges: u64,
    pub page_shifts: u64,
    pub root_updates: u64,
    pub split_updates: u64,
    pub commits: u64,
    pub recovers: u64,
    pub page_writes: u64,
    pub page_reads: u64,
}

impl Stats {
    /// A fresh, shareable counter bag.
    pub fn shared() -> SharedStats {
        Rc::new(RefCell::new(Stats::default()))
    }

    /// Emit the current counters to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        tracing::info!(
            target: "pagewright::stats",
            insertions = self.insertions,
            replacements = self.replacements,
            removals = self.removals,
            finds = self.finds,
            grows = self.grows,
            page_merges = self.page_merges,
            root_updates = self.root_updates,
            commits = self.commits,
            recovers = self.recovers,
            "tree stats snapshot"
        );
    }
}

/// Bump a counter on an `Option<SharedStats>` without requiring the caller
/// to match on it every time.
pub(crate) fn bump(stats: &Option<SharedStats>, f: impl FnOnce(&mut Stats)) {
    if let Some(s) = stats {
        f(&mut s.borrow_mut());
    }
}

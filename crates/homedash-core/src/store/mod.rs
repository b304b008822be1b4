// ── State storage ──
//
// Confirmed snapshot, optimistic overlay and the merged view consumers read.

pub mod optimistic;
mod sync_store;

pub use optimistic::{OPTIMISTIC_TTL, OptimisticEntry, OptimisticTracker, WriteId};
pub use sync_store::{DashboardView, SyncStore};

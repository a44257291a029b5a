//! Reconciliation engine keeping chat channels converged with tracker state.
//!
//! On every poll cycle the engine diffs the tracker snapshot against its own
//! persisted tracked-item records and drives three flows: channel creation
//! for newly qualifying items, retirement for items that stopped qualifying,
//! and additive membership sync for items tracked on both sides.

mod reconciler_runtime;

pub use reconciler_runtime::tracked_item_store::{
    JsonTrackedItemStore, StoreError, TrackedItem, TrackedItemPhase, TrackedItemStore,
};
pub use reconciler_runtime::{
    run_reconciler, ReconcilerConfig, ReconcilerDeps, ReconcilerRuntime, TickReport,
};

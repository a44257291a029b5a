use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

/// A qualifying tracker item at one point in time. Recomputed on every poll
/// cycle and never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable unique tracker key, e.g. `PROJ-1`.
    pub key: String,
    /// Display summary at snapshot time.
    pub title: String,
    /// Tracker-side collaborator identifiers (unique subtask assignees).
    pub collaborators: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
/// Produces the current set of qualifying items. An empty snapshot means
/// "nothing qualifies" and is distinct from a failed query.
pub trait SnapshotProvider: Send + Sync {
    async fn query(&self) -> Result<Vec<Item>, TrackerError>;
}

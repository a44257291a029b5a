//! Issue-tracker snapshot provider for the huddle reconciler.
//!
//! Exposes the [`SnapshotProvider`] contract consumed by the reconciliation
//! engine and a Jira-backed implementation that selects "collaborative"
//! items: active issues whose subtasks are assigned to more than one person.

mod jira_client;
mod snapshot;
mod transport;

pub use jira_client::{JiraSnapshotProvider, JiraSnapshotProviderConfig};
pub use snapshot::{Item, SnapshotProvider, TrackerError};

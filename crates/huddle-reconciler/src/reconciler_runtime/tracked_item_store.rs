//! Durable tracked-item records linking tracker keys to chat channels.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use huddle_core::write_text_atomic;

const TRACKED_ITEMS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracked-item store unavailable: {0}")]
    Unavailable(String),
}

/// Create progresses through two persisted phases so an interrupted flow can
/// be resumed instead of recreating the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedItemPhase {
    /// Written before the external channel-create call; `channel_handle`
    /// is filled in as soon as creation succeeds.
    Pending,
    /// Channel exists and the announcement has been posted.
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub key: String,
    #[serde(default)]
    pub channel_handle: Option<String>,
    /// Title cached at creation time; never refreshed on later edits.
    pub summary: String,
    pub phase: TrackedItemPhase,
}

impl TrackedItem {
    pub fn pending(key: &str, summary: &str) -> Self {
        Self {
            key: key.to_string(),
            channel_handle: None,
            summary: summary.to_string(),
            phase: TrackedItemPhase::Pending,
        }
    }

    pub fn committed(key: &str, channel_handle: &str, summary: &str) -> Self {
        Self {
            key: key.to_string(),
            channel_handle: Some(channel_handle.to_string()),
            summary: summary.to_string(),
            phase: TrackedItemPhase::Committed,
        }
    }
}

/// The engine's single source of truth for which channels should exist.
/// `list_all`, `upsert`, and `delete` are each individually consistent; no
/// multi-call transactions are offered or needed.
pub trait TrackedItemStore: Send + Sync {
    fn list_all(&self) -> Result<BTreeMap<String, TrackedItem>, StoreError>;
    fn upsert(&self, item: TrackedItem) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedItemsFile {
    schema_version: u32,
    #[serde(default)]
    tracked_items: BTreeMap<String, TrackedItem>,
}

impl Default for TrackedItemsFile {
    fn default() -> Self {
        Self {
            schema_version: TRACKED_ITEMS_SCHEMA_VERSION,
            tracked_items: BTreeMap::new(),
        }
    }
}

/// JSON-file store, written atomically on every mutation. A missing,
/// corrupt, or unknown-schema file starts fresh with a logged warning;
/// write failures surface as [`StoreError::Unavailable`].
pub struct JsonTrackedItemStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, TrackedItem>>,
}

impl JsonTrackedItemStore {
    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|error| {
                StoreError::Unavailable(format!(
                    "failed to read state file {}: {error}",
                    path.display()
                ))
            })?;
            match serde_json::from_str::<TrackedItemsFile>(&raw) {
                Ok(state) if state.schema_version == TRACKED_ITEMS_SCHEMA_VERSION => state,
                Ok(state) => {
                    eprintln!(
                        "unsupported tracked-items schema in {}: expected {}, found {} (starting fresh)",
                        path.display(),
                        TRACKED_ITEMS_SCHEMA_VERSION,
                        state.schema_version
                    );
                    TrackedItemsFile::default()
                }
                Err(error) => {
                    eprintln!(
                        "failed to parse tracked-items state file {}: {error} (starting fresh)",
                        path.display()
                    );
                    TrackedItemsFile::default()
                }
            }
        } else {
            TrackedItemsFile::default()
        };
        Ok(Self {
            path,
            items: Mutex::new(state.tracked_items),
        })
    }

    fn save(&self, items: &BTreeMap<String, TrackedItem>) -> Result<(), StoreError> {
        let state = TrackedItemsFile {
            schema_version: TRACKED_ITEMS_SCHEMA_VERSION,
            tracked_items: items.clone(),
        };
        let encoded = serde_json::to_string_pretty(&state).map_err(|error| {
            StoreError::Unavailable(format!("failed to encode tracked-items state: {error}"))
        })?;
        write_text_atomic(&self.path, &encoded).map_err(|error| {
            StoreError::Unavailable(format!(
                "failed to write state file {}: {error:#}",
                self.path.display()
            ))
        })
    }
}

impl TrackedItemStore for JsonTrackedItemStore {
    fn list_all(&self) -> Result<BTreeMap<String, TrackedItem>, StoreError> {
        let items = self
            .items
            .lock()
            .map_err(|_| StoreError::Unavailable("state mutex is poisoned".to_string()))?;
        Ok(items.clone())
    }

    fn upsert(&self, item: TrackedItem) -> Result<(), StoreError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StoreError::Unavailable("state mutex is poisoned".to_string()))?;
        items.insert(item.key.clone(), item);
        self.save(&items)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StoreError::Unavailable("state mutex is poisoned".to_string()))?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }
}

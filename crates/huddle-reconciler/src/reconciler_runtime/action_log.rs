use std::{
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use huddle_core::current_unix_timestamp_ms;

/// Append-only JSONL record of externally visible side effects (channel
/// creation, retirement, participant grants). Purely observational: append
/// failures are logged by the caller and never fail a flow.
pub(super) struct JsonlActionLog {
    path: PathBuf,
    file: Arc<Mutex<std::fs::File>>,
}

impl JsonlActionLog {
    pub(super) fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub(super) fn append(&self, action: &str, details: Value) -> Result<()> {
        let line = serde_json::to_string(&json!({
            "unix_ms": current_unix_timestamp_ms(),
            "action": action,
            "details": details,
        }))
        .context("failed to encode action log entry")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("action log mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

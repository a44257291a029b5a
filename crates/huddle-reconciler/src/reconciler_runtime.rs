//! Tick loop and the three state-transition flows (create, retire, sync).

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use serde_json::json;

use huddle_channel::{derive_channel_name, ChannelError, ChannelManager};
use huddle_directory::IdentityResolver;
use huddle_tracker::{Item, SnapshotProvider};

mod action_log;
mod render_helpers;
pub(crate) mod tracked_item_store;

use action_log::JsonlActionLog;
use render_helpers::{browse_link, render_announcement, render_welcome, retire_reason};
use tracked_item_store::{TrackedItem, TrackedItemPhase, TrackedItemStore};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Fixed delay between the end of one tick and the start of the next.
    /// Ticks never overlap: a slow tick defers the next one.
    pub poll_interval: Duration,
    /// Run exactly one tick, then exit (surface the tick error, if any).
    pub poll_once: bool,
    /// Tracker web base used to build `{base}/browse/{key}` links.
    pub tracker_base_url: String,
    pub state_dir: PathBuf,
}

/// The four collaborators the engine drives, injected at construction so
/// tests can substitute doubles for any of them.
#[derive(Clone)]
pub struct ReconcilerDeps {
    pub snapshot_provider: Arc<dyn SnapshotProvider>,
    pub identity_resolver: Arc<dyn IdentityResolver>,
    pub channel_manager: Arc<dyn ChannelManager>,
    pub store: Arc<dyn TrackedItemStore>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub discovered_items: usize,
    pub created_channels: usize,
    pub resumed_creates: usize,
    pub retired_items: usize,
    pub membership_additions: usize,
    pub failed_keys: usize,
}

enum CreateOutcome {
    Created,
    Resumed,
}

/// Runs the reconciler until shutdown (ctrl-c) or, with `poll_once`, for a
/// single tick.
pub async fn run_reconciler(config: ReconcilerConfig, deps: ReconcilerDeps) -> Result<()> {
    let mut runtime = ReconcilerRuntime::new(config, deps)?;
    runtime.run().await
}

pub struct ReconcilerRuntime {
    config: ReconcilerConfig,
    deps: ReconcilerDeps,
    action_log: JsonlActionLog,
}

impl ReconcilerRuntime {
    pub fn new(config: ReconcilerConfig, deps: ReconcilerDeps) -> Result<Self> {
        let action_log = JsonlActionLog::open(config.state_dir.join("actions.jsonl"))?;
        Ok(Self {
            config,
            deps,
            action_log,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.tick_once().await {
                Ok(report) => {
                    println!(
                        "reconcile tick: discovered={} created={} resumed={} retired={} membership_additions={} failed_keys={}",
                        report.discovered_items,
                        report.created_channels,
                        report.resumed_creates,
                        report.retired_items,
                        report.membership_additions,
                        report.failed_keys
                    );
                    if self.config.poll_once {
                        return Ok(());
                    }
                }
                Err(error) => {
                    eprintln!("reconcile tick error: {error:#}");
                    if self.config.poll_once {
                        return Err(error);
                    }
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("reconciler shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// One reconciliation pass. Snapshot or bulk-read failure aborts the
    /// whole tick without mutating anything; every per-key failure is
    /// contained to that key and counted in the report.
    pub async fn tick_once(&mut self) -> Result<TickReport> {
        let active_items = self
            .deps
            .snapshot_provider
            .query()
            .await
            .context("tracker snapshot failed, skipping tick")?;
        let tracked = self
            .deps
            .store
            .list_all()
            .context("tracked-item read failed, skipping tick")?;

        let active: BTreeMap<&str, &Item> = active_items
            .iter()
            .map(|item| (item.key.as_str(), item))
            .collect();

        let mut report = TickReport {
            discovered_items: active.len(),
            ..TickReport::default()
        };

        for (key, record) in &tracked {
            if active.contains_key(key.as_str()) {
                continue;
            }
            match self.retire_item(record).await {
                Ok(()) => report.retired_items += 1,
                Err(error) => {
                    eprintln!("failed to retire item {key}: {error:#}");
                    report.failed_keys += 1;
                }
            }
        }

        for (key, item) in &active {
            match tracked.get(*key) {
                None => match self.create_item(item, None).await {
                    Ok(_) => report.created_channels += 1,
                    Err(error) => {
                        eprintln!("failed to create channel for item {key}: {error:#}");
                        report.failed_keys += 1;
                    }
                },
                Some(record) if record.phase == TrackedItemPhase::Pending => {
                    match self.create_item(item, Some(record)).await {
                        Ok(CreateOutcome::Created) => report.created_channels += 1,
                        Ok(CreateOutcome::Resumed) => report.resumed_creates += 1,
                        Err(error) => {
                            eprintln!("failed to finish channel create for item {key}: {error:#}");
                            report.failed_keys += 1;
                        }
                    }
                }
                Some(record) => match self.sync_membership(item, record).await {
                    Ok(added) => report.membership_additions += added,
                    Err(error) => {
                        eprintln!("failed to sync membership for item {key}: {error:#}");
                        report.failed_keys += 1;
                    }
                },
            }
        }

        Ok(report)
    }

    /// Create flow. A pending record is persisted before the external
    /// channel-create call and the handle is persisted as soon as creation
    /// succeeds, so a restarted tick resumes (posts the missed announcement)
    /// instead of creating a second channel.
    async fn create_item(
        &self,
        item: &Item,
        pending: Option<&TrackedItem>,
    ) -> Result<CreateOutcome> {
        let mut record = match pending {
            Some(record) => record.clone(),
            None => {
                let record = TrackedItem::pending(&item.key, &item.title);
                self.deps.store.upsert(record.clone())?;
                record
            }
        };

        let resolved = self.resolve_collaborators(item).await;
        let (handle, outcome) = match record.channel_handle.clone() {
            Some(handle) => {
                eprintln!(
                    "resuming interrupted create for item {}: channel {handle} already exists",
                    item.key
                );
                (handle, CreateOutcome::Resumed)
            }
            None => {
                let name = derive_channel_name(&item.key, &item.title);
                let participants: BTreeSet<String> = resolved.iter().cloned().collect();
                let handle = self.deps.channel_manager.create(&name, &participants).await?;
                record.channel_handle = Some(handle.clone());
                self.deps.store.upsert(record.clone())?;
                self.log_action(
                    "channel_created",
                    json!({ "key": item.key, "channel": handle, "name": name }),
                );
                (handle, CreateOutcome::Created)
            }
        };

        let announcement = render_announcement(
            &item.key,
            &item.title,
            &browse_link(&self.config.tracker_base_url, &item.key),
            &resolved,
        );
        self.deps
            .channel_manager
            .post_message(&handle, &announcement)
            .await?;

        record.phase = TrackedItemPhase::Committed;
        self.deps.store.upsert(record)?;
        Ok(outcome)
    }

    /// Retire flow. The store is authoritative for "should this channel
    /// exist": the record is removed even when the platform-side delete
    /// fails, since a stale record would retry the delete forever.
    async fn retire_item(&self, record: &TrackedItem) -> Result<()> {
        if let Some(handle) = &record.channel_handle {
            match self
                .deps
                .channel_manager
                .delete(handle, &retire_reason(&record.key))
                .await
            {
                Ok(()) => {
                    self.log_action(
                        "channel_retired",
                        json!({ "key": record.key, "channel": handle }),
                    );
                }
                Err(ChannelError::NotFound(_)) => {}
                Err(error) => {
                    eprintln!(
                        "failed to delete channel {handle} for item {}: {error} (removing record anyway)",
                        record.key
                    );
                }
            }
        }
        self.deps.store.delete(&record.key)?;
        Ok(())
    }

    /// Membership sync is additive only: collaborators gain access, nobody
    /// is ever removed, so a shrinking collaborator set cannot lock someone
    /// out of an in-progress conversation.
    async fn sync_membership(&self, item: &Item, record: &TrackedItem) -> Result<usize> {
        let Some(handle) = record.channel_handle.as_deref() else {
            return Ok(0);
        };
        let participants = self.deps.channel_manager.list_participants(handle).await?;
        let mut added = 0_usize;
        for collaborator in &item.collaborators {
            let Some(user_id) = self.deps.identity_resolver.resolve(collaborator).await else {
                eprintln!("no chat identity for {collaborator} on item {}", item.key);
                continue;
            };
            if participants.contains(&user_id) {
                continue;
            }
            self.deps
                .channel_manager
                .add_participant(handle, &user_id)
                .await?;
            self.deps
                .channel_manager
                .post_message(handle, &render_welcome(&user_id, &item.key))
                .await?;
            self.log_action(
                "participant_added",
                json!({ "key": item.key, "channel": handle, "user": user_id }),
            );
            added += 1;
        }
        Ok(added)
    }

    /// Resolves collaborators to chat identities; unresolved ones are logged
    /// and skipped so one unknown person never fails a whole flow.
    async fn resolve_collaborators(&self, item: &Item) -> Vec<String> {
        let mut resolved = Vec::new();
        for collaborator in &item.collaborators {
            match self.deps.identity_resolver.resolve(collaborator).await {
                Some(user_id) => {
                    if !resolved.contains(&user_id) {
                        resolved.push(user_id);
                    }
                }
                None => {
                    eprintln!("no chat identity for {collaborator} on item {}", item.key);
                }
            }
        }
        resolved
    }

    fn log_action(&self, action: &str, details: serde_json::Value) {
        if let Err(error) = self.action_log.append(action, details) {
            eprintln!("failed to record {action} action: {error:#}");
        }
    }
}

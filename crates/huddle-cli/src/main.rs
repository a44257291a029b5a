//! Binary entry point wiring the reconciler to its live collaborators.

mod cli_args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;

use huddle_channel::{DiscordChannelManager, DiscordChannelManagerConfig};
use huddle_directory::FileIdentityResolver;
use huddle_reconciler::{
    run_reconciler, JsonTrackedItemStore, ReconcilerConfig, ReconcilerDeps,
};
use huddle_tracker::{JiraSnapshotProvider, JiraSnapshotProviderConfig};

use cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let poll_interval = Duration::from_secs(cli.poll_interval_seconds);
    let retry_max_attempts = cli.retry_max_attempts as usize;

    let snapshot_provider = JiraSnapshotProvider::new(JiraSnapshotProviderConfig {
        base_url: cli.jira_url.clone(),
        email: cli.jira_email,
        api_token: cli.jira_api_token,
        jql: cli.jira_jql,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })
    .context("failed to initialize jira snapshot provider")?;

    let channel_manager = DiscordChannelManager::new(DiscordChannelManagerConfig {
        api_base: cli.discord_api_base,
        bot_token: cli.discord_token,
        guild_id: cli.guild_id,
        bot_user_id: cli.bot_user_id,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })
    .context("failed to initialize discord channel manager")?;

    let identity_resolver = FileIdentityResolver::new(cli.directory_path, poll_interval);

    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("failed to create {}", cli.state_dir.display()))?;
    let store = JsonTrackedItemStore::load(cli.state_dir.join("tracked-items.json"))
        .context("failed to load tracked-item store")?;

    run_reconciler(
        ReconcilerConfig {
            poll_interval,
            poll_once: cli.once,
            tracker_base_url: cli.jira_url,
            state_dir: cli.state_dir,
        },
        ReconcilerDeps {
            snapshot_provider: Arc::new(snapshot_provider),
            identity_resolver: Arc::new(identity_resolver),
            channel_manager: Arc::new(channel_manager),
            store: Arc::new(store),
        },
    )
    .await
}

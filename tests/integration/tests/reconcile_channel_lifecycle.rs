//! End-to-end reconciliation against mocked Jira and Discord APIs, using the
//! real snapshot provider, channel manager, file resolver, and JSON store.

use std::{sync::Arc, time::Duration};

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use huddle_channel::{DiscordChannelManager, DiscordChannelManagerConfig};
use huddle_directory::FileIdentityResolver;
use huddle_reconciler::{
    run_reconciler, JsonTrackedItemStore, ReconcilerConfig, ReconcilerDeps, TrackedItem,
    TrackedItemPhase, TrackedItemStore,
};
use huddle_tracker::{JiraSnapshotProvider, JiraSnapshotProviderConfig};

struct Env {
    jira: MockServer,
    discord: MockServer,
    state: TempDir,
}

impl Env {
    fn new() -> Self {
        let state = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            state.path().join("directory.json"),
            r#"{"alice@example.com":"d100"}"#,
        )
        .expect("write directory");
        Self {
            jira: MockServer::start(),
            discord: MockServer::start(),
            state,
        }
    }

    fn deps(&self) -> ReconcilerDeps {
        let snapshot_provider = JiraSnapshotProvider::new(JiraSnapshotProviderConfig {
            base_url: self.jira.base_url(),
            email: "bot@example.com".to_string(),
            api_token: "jira-secret".to_string(),
            jql: None,
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("provider");
        let channel_manager = DiscordChannelManager::new(DiscordChannelManagerConfig {
            api_base: self.discord.base_url(),
            bot_token: "discord-secret".to_string(),
            guild_id: "g1".to_string(),
            bot_user_id: "bot9".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("manager");
        let identity_resolver = FileIdentityResolver::new(
            self.state.path().join("directory.json"),
            Duration::from_secs(60),
        );
        let store = JsonTrackedItemStore::load(self.state.path().join("tracked-items.json"))
            .expect("store");
        ReconcilerDeps {
            snapshot_provider: Arc::new(snapshot_provider),
            identity_resolver: Arc::new(identity_resolver),
            channel_manager: Arc::new(channel_manager),
            store: Arc::new(store),
        }
    }

    fn config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: Duration::from_secs(60),
            poll_once: true,
            tracker_base_url: self.jira.base_url(),
            state_dir: self.state.path().to_path_buf(),
        }
    }
}

fn mock_collaborative_issue(env: &Env) {
    env.jira.mock(|when, then| {
        when.method(GET).path("/rest/api/2/search");
        then.status(200).json_body(json!({
            "total": 1,
            "issues": [{
                "key": "PROJ-1",
                "fields": {
                    "summary": "Fix login bug",
                    "subtasks": [{ "key": "PROJ-2" }, { "key": "PROJ-3" }]
                }
            }]
        }));
    });
    env.jira.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/PROJ-2");
        then.status(200).json_body(json!({
            "fields": { "assignee": { "emailAddress": "alice@example.com" } }
        }));
    });
    env.jira.mock(|when, then| {
        when.method(GET).path("/rest/api/2/issue/PROJ-3");
        then.status(200).json_body(json!({
            "fields": { "assignee": { "emailAddress": "bob@example.com" } }
        }));
    });
}

#[tokio::test]
async fn functional_create_flow_materializes_channel_and_commits_record() {
    let env = Env::new();
    mock_collaborative_issue(&env);

    // bob@example.com has no directory entry: only d100 gets an overwrite.
    let create = env.discord.mock(|when, then| {
        when.method(POST)
            .path("/guilds/g1/channels")
            .body_includes("proj-1-fix-login-bug")
            .body_includes("\"d100\"");
        then.status(201).json_body(json!({ "id": "c777" }));
    });
    let announce = env.discord.mock(|when, then| {
        when.method(POST)
            .path("/channels/c777/messages")
            .body_includes("PROJ-1: Fix login bug")
            .body_includes("<@d100>");
        then.status(200).json_body(json!({ "id": "m1" }));
    });

    run_reconciler(env.config(), env.deps()).await.expect("run");

    create.assert();
    announce.assert();

    let store = JsonTrackedItemStore::load(env.state.path().join("tracked-items.json"))
        .expect("reload store");
    let tracked = store.list_all().expect("list");
    let record = tracked.get("PROJ-1").expect("record");
    assert_eq!(record.phase, TrackedItemPhase::Committed);
    assert_eq!(record.channel_handle.as_deref(), Some("c777"));
    assert_eq!(record.summary, "Fix login bug");

    let action_log =
        std::fs::read_to_string(env.state.path().join("actions.jsonl")).expect("action log");
    assert!(action_log.contains("channel_created"));
}

#[tokio::test]
async fn functional_retire_flow_deletes_channel_and_clears_store() {
    let env = Env::new();
    env.jira.mock(|when, then| {
        when.method(GET).path("/rest/api/2/search");
        then.status(200).json_body(json!({ "total": 0, "issues": [] }));
    });
    let delete = env.discord.mock(|when, then| {
        when.method(DELETE)
            .path("/channels/c777")
            .header("x-audit-log-reason", "item PROJ-1 no longer qualifies");
        then.status(200).json_body(json!({ "id": "c777" }));
    });

    {
        let store = JsonTrackedItemStore::load(env.state.path().join("tracked-items.json"))
            .expect("store");
        store
            .upsert(TrackedItem::committed("PROJ-1", "c777", "Fix login bug"))
            .expect("seed");
    }

    run_reconciler(env.config(), env.deps()).await.expect("run");

    delete.assert();
    let store = JsonTrackedItemStore::load(env.state.path().join("tracked-items.json"))
        .expect("reload store");
    assert!(store.list_all().expect("list").is_empty());
}

#[tokio::test]
async fn functional_steady_state_tick_makes_no_discord_writes() {
    let env = Env::new();
    mock_collaborative_issue(&env);
    let channel_detail = env.discord.mock(|when, then| {
        when.method(GET).path("/channels/c777");
        then.status(200).json_body(json!({
            "id": "c777",
            "permission_overwrites": [
                { "id": "g1", "type": 0, "deny": "1024" },
                { "id": "bot9", "type": 1, "allow": "1024" },
                { "id": "d100", "type": 1, "allow": "1024" }
            ]
        }));
    });

    {
        let store = JsonTrackedItemStore::load(env.state.path().join("tracked-items.json"))
            .expect("store");
        store
            .upsert(TrackedItem::committed("PROJ-1", "c777", "Fix login bug"))
            .expect("seed");
    }

    run_reconciler(env.config(), env.deps()).await.expect("run");

    // Membership already matches the resolvable collaborators: only the
    // read-side endpoint is hit.
    channel_detail.assert();
}

use std::path::PathBuf;

use clap::Parser;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "huddle",
    about = "Keeps chat collaboration channels in sync with tracker items",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "HUDDLE_JIRA_URL",
        help = "Jira base URL, e.g. https://example.atlassian.net"
    )]
    pub jira_url: String,

    #[arg(long, env = "HUDDLE_JIRA_EMAIL", help = "Jira account email for basic auth")]
    pub jira_email: String,

    #[arg(long, env = "HUDDLE_JIRA_API_TOKEN", help = "Jira API token")]
    pub jira_api_token: String,

    #[arg(
        long,
        env = "HUDDLE_JIRA_JQL",
        help = "Overrides the default active-issues JQL filter"
    )]
    pub jira_jql: Option<String>,

    #[arg(long, env = "HUDDLE_DISCORD_TOKEN", help = "Discord bot token")]
    pub discord_token: String,

    #[arg(long, env = "HUDDLE_GUILD_ID", help = "Discord guild (server) id")]
    pub guild_id: String,

    #[arg(long, env = "HUDDLE_BOT_USER_ID", help = "Discord user id of the bot itself")]
    pub bot_user_id: String,

    #[arg(
        long,
        env = "HUDDLE_DISCORD_API_BASE",
        default_value = "https://discord.com/api/v10",
        help = "Discord API base URL (override for testing)"
    )]
    pub discord_api_base: String,

    #[arg(
        long,
        env = "HUDDLE_DIRECTORY_PATH",
        help = "Path to the JSON identity directory mapping tracker emails to chat user ids"
    )]
    pub directory_path: PathBuf,

    #[arg(
        long,
        env = "HUDDLE_STATE_DIR",
        default_value = ".huddle",
        help = "Directory holding the tracked-items state file and action log"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "HUDDLE_POLL_INTERVAL_SECONDS",
        default_value = "60",
        value_parser = parse_positive_u64,
        help = "Seconds between reconciliation ticks"
    )]
    pub poll_interval_seconds: u64,

    #[arg(
        long,
        env = "HUDDLE_REQUEST_TIMEOUT_MS",
        default_value = "30000",
        value_parser = parse_positive_u64,
        help = "Per-request timeout for tracker and chat API calls"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "HUDDLE_RETRY_MAX_ATTEMPTS",
        default_value = "3",
        value_parser = parse_positive_u64,
        help = "Attempts per external request before surfacing a failure"
    )]
    pub retry_max_attempts: u64,

    #[arg(
        long,
        env = "HUDDLE_RETRY_BASE_DELAY_MS",
        default_value = "500",
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(long, help = "Run a single reconciliation tick, then exit")]
    pub once: bool,
}

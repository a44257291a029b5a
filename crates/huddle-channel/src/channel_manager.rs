use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("chat platform unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
/// Channel CRUD and membership operations against the chat platform.
///
/// `delete` is idempotent: deleting a handle that no longer exists is
/// success, so a retired item whose channel was removed out-of-band still
/// converges.
pub trait ChannelManager: Send + Sync {
    /// Creates a channel visible only to `participants` plus the bot itself,
    /// hidden from the default group. Returns the new channel handle.
    async fn create(
        &self,
        name: &str,
        participants: &BTreeSet<String>,
    ) -> Result<String, ChannelError>;

    async fn delete(&self, handle: &str, reason: &str) -> Result<(), ChannelError>;

    async fn add_participant(&self, handle: &str, user_id: &str) -> Result<(), ChannelError>;

    /// User ids currently granted access to the channel, bot included.
    async fn list_participants(&self, handle: &str) -> Result<BTreeSet<String>, ChannelError>;

    async fn post_message(&self, handle: &str, text: &str) -> Result<(), ChannelError>;
}

/// Derives a channel name from an item key and a prefix of its title:
/// lowercased, spaces become `-`, everything outside alphanumerics and
/// `-`/`_` is stripped. Uniqueness beyond the key itself is the platform's
/// concern.
pub fn derive_channel_name(key: &str, title: &str) -> String {
    let title_prefix: String = title.chars().take(20).collect();
    format!("{key}-{title_prefix}")
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_'))
        .collect()
}

/// Renders a user mention in the platform's inline syntax.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

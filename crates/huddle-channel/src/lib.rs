//! Chat-platform channel management for the huddle reconciler.
//!
//! Exposes the [`ChannelManager`] contract (create, delete, participant
//! grants, message posting) and a Discord-backed implementation that scopes
//! each channel to its participants through permission overwrites.

mod channel_manager;
mod discord_client;
mod transport;

pub use channel_manager::{derive_channel_name, mention, ChannelError, ChannelManager};
pub use discord_client::{DiscordChannelManager, DiscordChannelManagerConfig};

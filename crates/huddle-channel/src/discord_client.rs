//! Discord-backed channel manager.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::channel_manager::{ChannelError, ChannelManager};
use crate::transport::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

/// Permission bit granting channel visibility.
const VIEW_CHANNEL: &str = "1024";
const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;
const TEXT_CHANNEL: u8 = 0;

#[derive(Debug, Clone)]
pub struct DiscordChannelManagerConfig {
    pub api_base: String,
    pub bot_token: String,
    pub guild_id: String,
    pub bot_user_id: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

pub struct DiscordChannelManager {
    http: reqwest::Client,
    api_base: String,
    guild_id: String,
    bot_user_id: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ChannelCreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelDetailResponse {
    #[serde(default)]
    permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Deserialize)]
struct PermissionOverwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
}

impl DiscordChannelManager {
    pub fn new(config: DiscordChannelManagerConfig) -> Result<Self, ChannelError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth_header = format!("Bot {}", config.bot_token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header).map_err(|_| {
                ChannelError::Unavailable("invalid discord authorization header".to_string())
            })?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                ChannelError::Unavailable(format!("failed to create discord client: {error}"))
            })?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            guild_id: config.guild_id,
            bot_user_id: config.bot_user_id,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn request<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, ChannelError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ChannelError::NotFound(operation.to_string()));
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(ChannelError::Unavailable(format!(
                        "discord {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    )));
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(ChannelError::Unavailable(format!(
                        "discord {operation} request failed: {error}"
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ChannelManager for DiscordChannelManager {
    async fn create(
        &self,
        name: &str,
        participants: &BTreeSet<String>,
    ) -> Result<String, ChannelError> {
        let mut overwrites = vec![
            // The guild id doubles as the @everyone role id.
            json!({ "id": self.guild_id, "type": OVERWRITE_ROLE, "deny": VIEW_CHANNEL }),
            json!({ "id": self.bot_user_id, "type": OVERWRITE_MEMBER, "allow": VIEW_CHANNEL }),
        ];
        for user_id in participants {
            if *user_id == self.bot_user_id {
                continue;
            }
            overwrites.push(
                json!({ "id": user_id, "type": OVERWRITE_MEMBER, "allow": VIEW_CHANNEL }),
            );
        }
        let payload = json!({
            "name": name,
            "type": TEXT_CHANNEL,
            "permission_overwrites": overwrites,
        });

        let response = self
            .request("create channel", || {
                self.http
                    .post(format!(
                        "{}/guilds/{}/channels",
                        self.api_base, self.guild_id
                    ))
                    .json(&payload)
            })
            .await?;
        let created: ChannelCreateResponse = response.json().await.map_err(|error| {
            ChannelError::Unavailable(format!("failed to decode created channel: {error}"))
        })?;
        Ok(created.id)
    }

    async fn delete(&self, handle: &str, reason: &str) -> Result<(), ChannelError> {
        let result = self
            .request("delete channel", || {
                self.http
                    .delete(format!("{}/channels/{}", self.api_base, handle))
                    .header("x-audit-log-reason", reason)
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            // Already gone: the desired end state holds.
            Err(ChannelError::NotFound(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn add_participant(&self, handle: &str, user_id: &str) -> Result<(), ChannelError> {
        let payload = json!({ "type": OVERWRITE_MEMBER, "allow": VIEW_CHANNEL, "deny": "0" });
        self.request("grant channel access", || {
            self.http
                .put(format!(
                    "{}/channels/{}/permissions/{}",
                    self.api_base, handle, user_id
                ))
                .json(&payload)
        })
        .await?;
        Ok(())
    }

    async fn list_participants(&self, handle: &str) -> Result<BTreeSet<String>, ChannelError> {
        let response = self
            .request("fetch channel", || {
                self.http
                    .get(format!("{}/channels/{}", self.api_base, handle))
            })
            .await?;
        let detail: ChannelDetailResponse = response.json().await.map_err(|error| {
            ChannelError::Unavailable(format!("failed to decode channel detail: {error}"))
        })?;
        Ok(detail
            .permission_overwrites
            .into_iter()
            .filter(|overwrite| overwrite.kind == OVERWRITE_MEMBER)
            .map(|overwrite| overwrite.id)
            .collect())
    }

    async fn post_message(&self, handle: &str, text: &str) -> Result<(), ChannelError> {
        let payload = json!({ "content": text });
        self.request("post message", || {
            self.http
                .post(format!("{}/channels/{}/messages", self.api_base, handle))
                .json(&payload)
        })
        .await?;
        Ok(())
    }
}

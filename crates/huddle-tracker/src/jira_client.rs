//! Jira-backed snapshot provider.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::snapshot::{Item, SnapshotProvider, TrackerError};
use crate::transport::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

/// Issues in these statuses are considered active for collaboration.
pub const ACTIVE_ISSUES_JQL: &str = "status in (\"To Do\", \"In Progress\")";

const SEARCH_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub struct JiraSnapshotProviderConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    /// Overrides the default active-issues JQL when set.
    pub jql: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

pub struct JiraSnapshotProvider {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    jql: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    fields: SearchIssueFields,
}

#[derive(Debug, Deserialize)]
struct SearchIssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    subtasks: Vec<SubtaskLink>,
}

#[derive(Debug, Deserialize)]
struct SubtaskLink {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SubtaskDetail {
    fields: SubtaskDetailFields,
}

#[derive(Debug, Deserialize)]
struct SubtaskDetailFields {
    #[serde(default)]
    assignee: Option<SubtaskAssignee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubtaskAssignee {
    #[serde(default)]
    email_address: Option<String>,
}

impl JiraSnapshotProvider {
    pub fn new(config: JiraSnapshotProviderConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                TrackerError::Unavailable(format!("failed to create jira client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email,
            api_token: config.api_token,
            jql: config
                .jql
                .filter(|jql| !jql.trim().is_empty())
                .unwrap_or_else(|| ACTIVE_ISSUES_JQL.to_string()),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn search_active_issues(&self) -> Result<Vec<SearchIssue>, TrackerError> {
        let mut start_at = 0_u64;
        let mut rows = Vec::new();
        loop {
            let start_value = start_at.to_string();
            let page_value = SEARCH_PAGE_SIZE.to_string();
            let page: SearchPage = self
                .request_json("search issues", || {
                    self.http
                        .get(format!("{}/rest/api/2/search", self.base_url))
                        .query(&[
                            ("jql", self.jql.as_str()),
                            ("fields", "summary,subtasks"),
                            ("startAt", start_value.as_str()),
                            ("maxResults", page_value.as_str()),
                        ])
                })
                .await?;
            let page_len = page.issues.len() as u64;
            rows.extend(page.issues);
            start_at = start_at.saturating_add(page_len);
            if page_len == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(rows)
    }

    /// Unique subtask assignee emails for one issue. Subtask lookups that
    /// fail are logged and skipped so one bad subtask cannot disqualify the
    /// whole issue or fail the snapshot.
    async fn collect_subtask_assignees(&self, subtasks: &[SubtaskLink]) -> BTreeSet<String> {
        let mut assignees = BTreeSet::new();
        for subtask in subtasks {
            let detail: Result<SubtaskDetail, TrackerError> = self
                .request_json("fetch subtask", || {
                    self.http
                        .get(format!(
                            "{}/rest/api/2/issue/{}",
                            self.base_url, subtask.key
                        ))
                        .query(&[("fields", "assignee")])
                })
                .await;
            match detail {
                Ok(detail) => {
                    if let Some(email) = detail
                        .fields
                        .assignee
                        .and_then(|assignee| assignee.email_address)
                    {
                        assignees.insert(email);
                    }
                }
                Err(error) => {
                    eprintln!("error fetching subtask {}: {error}", subtask.key);
                }
            }
        }
        assignees
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .basic_auth(&self.email, Some(&self.api_token))
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|error| {
                            TrackerError::Unavailable(format!(
                                "failed to decode jira {operation}: {error}"
                            ))
                        });
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

                    return Err(TrackerError::Unavailable(format!(
                        "jira {operation} failed with status {}: {}",
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
                    return Err(TrackerError::Unavailable(format!(
                        "jira {operation} request failed: {error}"
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl SnapshotProvider for JiraSnapshotProvider {
    async fn query(&self) -> Result<Vec<Item>, TrackerError> {
        let issues = self.search_active_issues().await?;
        let mut items = Vec::new();
        for issue in issues {
            if issue.fields.subtasks.is_empty() {
                continue;
            }
            let collaborators = self.collect_subtask_assignees(&issue.fields.subtasks).await;
            if collaborators.len() > 1 {
                items.push(Item {
                    key: issue.key,
                    title: issue.fields.summary.unwrap_or_default(),
                    collaborators,
                });
            }
        }
        Ok(items)
    }
}

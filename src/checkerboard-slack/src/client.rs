//! Thin Slack Web API client.
//!
//! Only the three read methods the directory needs are wrapped:
//! `team.profile.get`, `users.list` and `users.profile.get`.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::SlackConfig;
use crate::error::{SlackApiError, SlackError, SlackResult};
use crate::retry::Retry;

/// Page size requested from `users.list`.
pub const USERS_PAGE_LIMIT: u32 = 1000;

/// A custom profile field defined for the workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamProfileField {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// A member entry from `users.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    pub id: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_app_user: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Member {
    /// The member's ID if it is a person whose profile should be read.
    pub fn person_id(&self) -> Option<&str> {
        let id = self.id.as_deref().filter(|id| !id.is_empty())?;
        if self.is_bot || self.is_app_user || self.deleted || id == "USLACKBOT" {
            return None;
        }
        Some(id)
    }
}

/// One page of `users.list`.
#[derive(Debug, Clone, Default)]
pub struct UsersPage {
    pub members: Vec<Member>,
    /// Cursor for the next page, `None` on the last one.
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct TeamProfileResponse {
    profile: TeamProfile,
}

#[derive(Deserialize)]
struct TeamProfile {
    #[serde(default)]
    fields: Vec<TeamProfileField>,
}

#[derive(Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct UserProfileResponse {
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Deserialize)]
struct UserProfile {
    /// Keyed by field ID. Slack sends `null` or `[]` when no fields are set.
    #[serde(default)]
    fields: serde_json::Value,
}

/// Slack Web API client with retry.
#[derive(Debug)]
pub struct SlackClient {
    config: SlackConfig,
    http: reqwest::Client,
    retry: Retry,
}

impl SlackClient {
    /// Create a client; fails on invalid configuration.
    pub fn new(config: SlackConfig) -> SlackResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("checkerboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SlackError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let retry = Retry::new(config.retry().clone());
        Ok(Self {
            config,
            http,
            retry,
        })
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Custom profile fields defined for the workspace.
    pub async fn team_profile_fields(&self) -> SlackResult<Vec<TeamProfileField>> {
        let response: TeamProfileResponse = self.api_call("team.profile.get", &[]).await?;
        Ok(response.profile.fields)
    }

    /// One page of workspace members.
    pub async fn list_users(&self, cursor: Option<&str>) -> SlackResult<UsersPage> {
        let mut query = vec![("limit", USERS_PAGE_LIMIT.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response: UsersListResponse = self.api_call("users.list", &query).await?;
        let next_cursor = response
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.is_empty());

        Ok(UsersPage {
            members: response.members,
            next_cursor,
        })
    }

    /// Value of one custom profile field for a user.
    pub async fn profile_field_value(
        &self,
        user_id: &str,
        field_id: &str,
    ) -> SlackResult<Option<String>> {
        let query = [("user", user_id.to_string())];
        let response: UserProfileResponse = self.api_call("users.profile.get", &query).await?;

        let value = response.profile.and_then(|profile| {
            profile
                .fields
                .get(field_id)
                .and_then(|field| field.get("value"))
                .and_then(|value| value.as_str())
                .map(str::to_string)
        });
        trace!(user_id, has_value = value.is_some(), "Read profile field");
        Ok(value)
    }

    /// Call a Web API method with retry.
    async fn api_call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> SlackResult<T> {
        self.retry
            .execute(|| self.api_call_once(method, query))
            .await
    }

    async fn api_call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> SlackResult<T> {
        let url = format!("{}/{}", self.config.base_url(), method);
        debug!(method, "Calling Slack API");

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.config.token())
            .query(query)
            .send()
            .await?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SlackError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(0),
            });
        }
        if status.is_server_error() {
            return Err(SlackError::Network(format!("{} returned {}", method, status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Api(format!("{} returned {}: {}", method, status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let code = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            return Err(SlackApiError::new(code, method)
                .with_retry_after(retry_after)
                .into());
        }

        Ok(serde_json::from_value(body)?)
    }
}

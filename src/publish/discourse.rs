//! Discourse API client.
//!
//! Authenticates with the `Api-Key` / `Api-Username` header pair. Every
//! call is a single attempt; non-success statuses are returned as
//! [`RemoteFailure::Status`] with the `Retry-After` header preserved for the
//! retry executor.

use async_trait::async_trait;
use serde::Deserialize;

use super::{CreatedTopic, PublishClient, PublishRequest, PublishResponse, RemoteFailure};

/// Connection settings for a Discourse instance.
#[derive(Debug, Clone)]
pub struct DiscourseConfig {
    /// Base URL, e.g. `https://discourse.mozilla.org`.
    pub base_url: String,
    /// Admin API key.
    pub api_key: String,
    /// User the API key acts as.
    pub api_username: String,
}

impl DiscourseConfig {
    /// Create a config for the given instance and credentials.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_username: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_username: api_username.into(),
        }
    }
}

/// [`PublishClient`] backed by the Discourse REST API.
pub struct DiscourseClient {
    config: DiscourseConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscourseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscourseClient")
            .field("base_url", &self.config.base_url)
            .field("api_username", &self.config.api_username)
            .finish()
    }
}

/// Body of a successful `POST /posts.json`.
#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    id: u64,
    topic_id: u64,
}

impl DiscourseClient {
    /// Create a client for the given instance.
    pub fn new(config: DiscourseConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, request: &PublishRequest) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            request.path()
        )
    }
}

/// JSON body for a request, if it has one.
fn request_body(request: &PublishRequest) -> Option<serde_json::Value> {
    match request {
        PublishRequest::CreateTopic {
            category,
            title,
            raw,
            tags,
        } => Some(serde_json::json!({
            "category": category,
            "title": title,
            "raw": raw,
            "tags": tags,
        })),
        PublishRequest::UpdateTopic { title, tags, .. } => Some(serde_json::json!({
            "title": title,
            "tags": tags,
        })),
        PublishRequest::UpdatePost { raw, .. } => Some(serde_json::json!({
            "post": { "raw": raw },
        })),
        PublishRequest::ResetBump { .. } | PublishRequest::DeleteTopic { .. } => None,
    }
}

#[async_trait]
impl PublishClient for DiscourseClient {
    fn name(&self) -> &str {
        "discourse"
    }

    async fn send(&self, request: &PublishRequest) -> Result<PublishResponse, RemoteFailure> {
        let url = self.url(request);
        let mut builder = match request {
            PublishRequest::CreateTopic { .. } => self.client.post(&url),
            PublishRequest::DeleteTopic { .. } => self.client.delete(&url),
            PublishRequest::UpdateTopic { .. }
            | PublishRequest::UpdatePost { .. }
            | PublishRequest::ResetBump { .. } => self.client.put(&url),
        }
        .header("Api-Key", &self.config.api_key)
        .header("Api-Username", &self.config.api_username);

        if let Some(body) = request_body(request) {
            builder = builder.json(&body);
        }

        tracing::debug!(request = %request, "sending Discourse request");
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFailure::Status {
                status: status.as_u16(),
                retry_after,
                body,
            });
        }

        match request {
            PublishRequest::CreateTopic { .. } => {
                let created: CreatePostResponse = response
                    .json()
                    .await
                    .map_err(|e| RemoteFailure::Decode(e.to_string()))?;
                Ok(PublishResponse::Created(CreatedTopic {
                    topic_id: created.topic_id,
                    post_id: created.id,
                }))
            }
            _ => Ok(PublishResponse::Done),
        }
    }
}

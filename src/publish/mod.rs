//! Remote forum mutations.
//!
//! [`PublishClient`] is the seam between the orchestrator and the forum API.
//! Requests are plain values so the retry executor can rewrite them (a short
//! title gets padded) and so a fatal error can carry the exact request that
//! failed.

pub mod discourse;
pub mod retry;

use async_trait::async_trait;

pub use discourse::{DiscourseClient, DiscourseConfig};
pub use retry::{FailureClass, RetryExecutor, RetryPolicy};

/// One mutation against the forum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishRequest {
    /// Create a topic with its first post.
    CreateTopic {
        /// Category the topic is created in.
        category: u64,
        /// Topic title.
        title: String,
        /// Markdown body of the first post.
        raw: String,
        /// Topic tags.
        tags: Vec<String>,
    },
    /// Rewrite a topic's title and tags.
    UpdateTopic {
        /// Topic to rewrite.
        topic_id: u64,
        /// New title.
        title: String,
        /// New tags.
        tags: Vec<String>,
    },
    /// Rewrite the body of a post.
    UpdatePost {
        /// Post to rewrite.
        post_id: u64,
        /// New markdown body.
        raw: String,
    },
    /// Reset the topic's bump date so edits don't float it to the top.
    ResetBump {
        /// Topic to reset.
        topic_id: u64,
    },
    /// Delete a topic.
    DeleteTopic {
        /// Topic to delete.
        topic_id: u64,
    },
}

impl PublishRequest {
    /// HTTP method used for this request.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateTopic { .. } => "POST",
            Self::UpdateTopic { .. } | Self::UpdatePost { .. } | Self::ResetBump { .. } => "PUT",
            Self::DeleteTopic { .. } => "DELETE",
        }
    }

    /// Path relative to the forum base URL.
    pub fn path(&self) -> String {
        match self {
            Self::CreateTopic { .. } => "/posts.json".to_owned(),
            Self::UpdateTopic { topic_id, .. } => format!("/t/-/{topic_id}.json"),
            Self::UpdatePost { post_id, .. } => format!("/posts/{post_id}.json"),
            Self::ResetBump { topic_id } => format!("/t/{topic_id}/reset-bump-date.json"),
            Self::DeleteTopic { topic_id } => format!("/t/{topic_id}.json"),
        }
    }

    /// The title field, for requests that carry one.
    pub fn title_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::CreateTopic { title, .. } | Self::UpdateTopic { title, .. } => Some(title),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublishRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method(), self.path())?;
        match self {
            Self::CreateTopic { title, .. } | Self::UpdateTopic { title, .. } => {
                write!(f, " ({title:?})")
            }
            _ => Ok(()),
        }
    }
}

/// Ids assigned to a newly created topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedTopic {
    /// New topic id.
    pub topic_id: u64,
    /// Id of the topic's first post.
    pub post_id: u64,
}

/// Successful outcome of a [`PublishRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResponse {
    /// A topic was created.
    Created(CreatedTopic),
    /// The mutation was applied; nothing to report.
    Done,
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw `Retry-After` header, if sent.
        retry_after: Option<String>,
        /// Response body.
        body: String,
    },
    /// No response at all (connection, TLS, timeout).
    Transport(String),
    /// Success status, but the body could not be decoded.
    Decode(String),
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body, .. } => write!(f, "HTTP {status}: {body}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(e) => write!(f, "undecodable response: {e}"),
        }
    }
}

/// A remote forum that accepts [`PublishRequest`]s.
///
/// Implementations make exactly one attempt per call; retrying is the job of
/// [`RetryExecutor`].
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Send one request.
    async fn send(&self, request: &PublishRequest) -> Result<PublishResponse, RemoteFailure>;
}

//! Core data types: source events and persisted publish records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the post/tag formatting in [`crate::render`].
///
/// Bump whenever rendered output changes so every published topic is
/// refreshed on the next run.
pub const GENERATOR_VERSION: u32 = 7;

/// One candidate forum topic for the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Stable external identifier, unique within one fetch.
    pub id: String,
    /// Last source-side modification.
    pub updated_at: DateTime<Utc>,
    /// Topic title.
    pub title: String,
    /// Free-form description (becomes the post body).
    pub description: String,
    /// Session facilitators, in source order.
    pub authors: Vec<String>,
    /// Optional stated goals of the session.
    pub goals: Option<String>,
    /// Category label, used as the topic tag.
    pub track: String,
}

impl Event {
    /// Title used for duplicate detection: trimmed and lowercased.
    pub fn normalized_title(&self) -> String {
        self.title.trim().to_lowercase()
    }
}

/// Persisted correlation between an event id and its remote topic.
///
/// A record either points at a published topic (`topic_id`/`post_id`) or is
/// an alias of another event (`duplicate_of`). Every field is optional so a
/// freshly observed event can be tracked before anything is published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    /// Discourse topic id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<u64>,
    /// Discourse id of the topic's first post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<u64>,
    /// Event `updated_at` as of the last successful publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// [`GENERATOR_VERSION`] used for the last publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_version: Option<u32>,
    /// Start time of the last run that saw this id in the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_marker: Option<DateTime<Utc>>,
    /// Id of the event this one duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl PublishRecord {
    /// Minimal alias record. Publish fields are not carried over.
    pub fn duplicate(of: impl Into<String>) -> Self {
        Self {
            duplicate_of: Some(of.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if this record aliases another event.
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// Returns `true` if a remote topic exists for this record.
    pub fn is_published(&self) -> bool {
        self.topic_id.is_some()
    }
}

//! Configuration for a sync run.
//!
//! Settings come from an optional TOML file and are then overridden by the
//! environment, which is where credentials and the full-wipe switch live:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `DISCOURSE_URL` | `discourse.base_url` |
//! | `DISCOURSE_KEY` | `discourse.api_key` |
//! | `DISCOURSE_USER` | `discourse.api_username` |
//! | `CATEGORY_ID` | `discourse.category_id` |
//! | `ZENKIT_KEY` | `zenkit.api_key` |
//! | `ZENKIT_LIST_ID` | `zenkit.list_id` |
//! | `TOPIC_SYNC_STORE` | `store.path` |
//! | `FULL_WIPE` | `full_wipe` |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::publish::{DiscourseConfig, RetryPolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Target forum.
    pub discourse: DiscourseSettings,
    /// Event source.
    pub zenkit: ZenkitSettings,
    /// Correlation store location.
    pub store: StoreSettings,
    /// Retry limits.
    pub retry: RetrySettings,
    /// Redirect file generation.
    pub redirects: RedirectSettings,
    /// Retract every published topic instead of syncing.
    pub full_wipe: bool,
}

/// Discourse connection and publishing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscourseSettings {
    /// Base URL of the forum.
    pub base_url: String,
    /// Admin API key.
    pub api_key: String,
    /// User the API key acts as.
    pub api_username: String,
    /// Category new topics are created in.
    pub category_id: Option<u64>,
    /// Reset the bump date after editing a topic.
    pub reset_bump: bool,
    /// Delete the topic of an event that turns out to be a duplicate.
    pub retract_orphaned_duplicates: bool,
}

impl Default for DiscourseSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_owned(),
            api_key: String::new(),
            api_username: "system".to_owned(),
            category_id: None,
            reset_bump: true,
            retract_orphaned_duplicates: true,
        }
    }
}

/// Zenkit list and field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenkitSettings {
    /// API base URL.
    pub base_url: String,
    /// API key.
    pub api_key: String,
    /// Short id of the list holding the events.
    pub list_id: String,
    /// Only entries whose status field has this value are published.
    pub accepted_status: String,
    /// Entry field keys.
    pub fields: ZenkitFields,
}

impl Default for ZenkitSettings {
    fn default() -> Self {
        Self {
            base_url: "https://zenkit.com/api/v1".to_owned(),
            api_key: String::new(),
            list_id: "2RH604FcHf".to_owned(),
            accepted_status: "Accepted".to_owned(),
            fields: ZenkitFields::default(),
        }
    }
}

/// Keys of the Zenkit entry fields each event attribute is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenkitFields {
    /// Text field with the title.
    pub title: String,
    /// Text field with the description.
    pub description: String,
    /// Reference field with the facilitators.
    pub authors: String,
    /// Optional text field with the session goals.
    pub goals: Option<String>,
    /// Category field with the track.
    pub track: String,
    /// Optional category field with the review status.
    pub status: Option<String>,
}

impl Default for ZenkitFields {
    fn default() -> Self {
        Self {
            title: "48420d56-1332-4366-8e2a-bcce7b33d179_text".to_owned(),
            description: "a200e6e4-370d-440c-89af-abf264bf14a6_text".to_owned(),
            authors: "c4df21bc-c38b-432d-abb7-ad469f8dba9e_references_sort".to_owned(),
            goals: None,
            track: "ed0250e6-6282-4922-9716-dfd7a29aafb7_categories_sort".to_owned(),
            status: None,
        }
    }
}

/// Where the correlation store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path of the JSON store.
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.json"),
        }
    }
}

/// Limits for rate-limit backoff and title padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Rate-limited responses tolerated per request.
    pub max_attempts: u32,
    /// Time budget per request in seconds.
    pub deadline_secs: u64,
    /// How often a too-short title may be padded.
    pub max_title_fixes: u32,
    /// Text appended to a too-short title.
    pub title_suffix: String,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            deadline_secs: policy.deadline.as_secs(),
            max_title_fixes: policy.max_title_fixes,
            title_suffix: policy.title_suffix,
        }
    }
}

/// Static redirect file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectSettings {
    /// Output file.
    pub path: PathBuf,
    /// Path segment the event ids live under, e.g. `2019`.
    pub prefix: String,
    /// Public forum URL the redirects point to.
    pub public_url: String,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("_redirects"),
            prefix: "2019".to_owned(),
            public_url: "https://discourse.mozilla.org".to_owned(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load the file at `path` if it exists (defaults otherwise), then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is invalid or an override cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for an unparseable `CATEGORY_ID` or
    /// `FULL_WIPE`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("DISCOURSE_URL") {
            self.discourse.base_url = v;
        }
        if let Some(v) = lookup("DISCOURSE_KEY") {
            self.discourse.api_key = v;
        }
        if let Some(v) = lookup("DISCOURSE_USER") {
            self.discourse.api_username = v;
        }
        if let Some(v) = lookup("CATEGORY_ID") {
            let id = v
                .trim()
                .parse()
                .map_err(|e| SyncError::Config(format!("CATEGORY_ID {v:?}: {e}")))?;
            self.discourse.category_id = Some(id);
        }
        if let Some(v) = lookup("ZENKIT_KEY") {
            self.zenkit.api_key = v;
        }
        if let Some(v) = lookup("ZENKIT_LIST_ID") {
            self.zenkit.list_id = v;
        }
        if let Some(v) = lookup("TOPIC_SYNC_STORE") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FULL_WIPE") {
            self.full_wipe = parse_flag(&v)
                .ok_or_else(|| SyncError::Config(format!("FULL_WIPE {v:?} is not a boolean")))?;
        }
        Ok(())
    }

    /// Check everything a sync run needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        if !self.discourse.base_url.starts_with("http://")
            && !self.discourse.base_url.starts_with("https://")
        {
            return Err(SyncError::Config(format!(
                "discourse.base_url must be an http(s) URL, got {:?}",
                self.discourse.base_url
            )));
        }
        if self.discourse.api_key.is_empty() {
            return Err(SyncError::Config("DISCOURSE_KEY is not set".to_owned()));
        }
        // A full wipe never reads the source or creates topics.
        if !self.full_wipe {
            if self.discourse.category_id.is_none() {
                return Err(SyncError::Config("CATEGORY_ID is not set".to_owned()));
            }
            if self.zenkit.api_key.is_empty() {
                return Err(SyncError::Config("ZENKIT_KEY is not set".to_owned()));
            }
            if self.zenkit.list_id.is_empty() {
                return Err(SyncError::Config("zenkit.list_id is empty".to_owned()));
            }
        }
        Ok(())
    }

    /// Discourse client settings.
    pub fn discourse_client(&self) -> DiscourseConfig {
        DiscourseConfig::new(
            &self.discourse.base_url,
            &self.discourse.api_key,
            &self.discourse.api_username,
        )
    }

    /// Retry executor policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            deadline: Duration::from_secs(self.retry.deadline_secs),
            max_title_fixes: self.retry.max_title_fixes,
            title_suffix: self.retry.title_suffix.clone(),
        }
    }

    /// Default config file: `$TOPIC_SYNC_CONFIG`, else
    /// `<config dir>/topic-sync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os("TOPIC_SYNC_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|d| d.join("topic-sync"))
            .unwrap_or_else(|| PathBuf::from("/tmp/topic-sync"))
            .join("config.toml")
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off` (any case). Empty is off.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

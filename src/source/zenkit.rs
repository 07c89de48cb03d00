//! Zenkit list source.
//!
//! Zenkit entries are flat JSON objects whose field keys are
//! `<field uuid>_<kind>`: `_text` fields hold strings, `_references_sort`
//! holds `{displayString}` objects and `_categories_sort` holds `{name}`
//! objects. The key for each event attribute comes from [`ZenkitFields`].

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::EventSource;
use crate::config::{ZenkitFields, ZenkitSettings};
use crate::error::{Result, SyncError};
use crate::model::Event;

/// Response of `POST /lists/{id}/entries/filter/list`.
#[derive(Debug, Deserialize)]
struct FilterListResponse {
    #[serde(rename = "listEntries", default)]
    list_entries: Vec<Value>,
}

/// [`EventSource`] reading a Zenkit list.
pub struct ZenkitSource {
    settings: ZenkitSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for ZenkitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenkitSource")
            .field("base_url", &self.settings.base_url)
            .field("list_id", &self.settings.list_id)
            .finish()
    }
}

impl ZenkitSource {
    /// Create a source for the configured list.
    pub fn new(settings: ZenkitSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventSource for ZenkitSource {
    async fn fetch(&self) -> Result<Vec<Event>> {
        let url = format!(
            "{}/lists/{}/entries/filter/list",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.list_id
        );
        let response = self
            .client
            .post(&url)
            .header("Zenkit-API-Key", &self.settings.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| SyncError::SourceFetch(format!("Zenkit request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SourceFetch(format!(
                "Zenkit HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let list: FilterListResponse = response
            .json()
            .await
            .map_err(|e| SyncError::SourceFetch(format!("Zenkit response: {e}")))?;

        let events = normalize_entries(&list.list_entries, &self.settings);
        info!(
            entries = list.list_entries.len(),
            events = events.len(),
            "fetched Zenkit list"
        );
        Ok(events)
    }
}

/// Turn raw entries into events, dropping unusable entries and repeated ids.
pub fn normalize_entries(entries: &[Value], settings: &ZenkitSettings) -> Vec<Event> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| is_accepted(entry, settings))
        .filter_map(|entry| normalize_entry(entry, &settings.fields))
        .filter(|event| {
            let fresh = seen.insert(event.id.clone());
            if !fresh {
                warn!(id = %event.id, "dropping repeated Zenkit entry");
            }
            fresh
        })
        .collect()
}

fn is_accepted(entry: &Value, settings: &ZenkitSettings) -> bool {
    let Some(key) = &settings.fields.status else {
        return true;
    };
    first_label(entry, key, "name").as_deref() == Some(settings.accepted_status.as_str())
}

/// Map one entry. Entries without id, timestamp, title or track are skipped.
pub fn normalize_entry(entry: &Value, fields: &ZenkitFields) -> Option<Event> {
    let id = entry.get("shortId").and_then(Value::as_str)?.to_owned();

    let Some(track) = first_label(entry, &fields.track, "name") else {
        debug!(id = %id, "skipping entry without a track");
        return None;
    };

    let Some(title) = text(entry, &fields.title).filter(|t| !t.is_empty()) else {
        debug!(id = %id, "skipping entry without a title");
        return None;
    };

    let updated_at = entry
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    let Some(updated_at) = updated_at else {
        warn!(id = %id, "skipping entry with missing or invalid updated_at");
        return None;
    };

    let authors = entry
        .get(&fields.authors)
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(|r| r.get("displayString").and_then(Value::as_str))
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Event {
        id,
        updated_at,
        title,
        description: text(entry, &fields.description).unwrap_or_default(),
        authors,
        goals: fields
            .goals
            .as_deref()
            .and_then(|key| text(entry, key))
            .filter(|g| !g.is_empty()),
        track,
    })
}

fn text(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
}

fn first_label(entry: &Value, key: &str, label: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get(label))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

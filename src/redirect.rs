//! Static redirect file generation.
//!
//! Emits one Netlify-style rule per event id so that stable event URLs
//! (`/<prefix>/<id>`) land on the forum topic.

use std::path::Path;

use crate::error::Result;
use crate::store::RecordMap;

/// Render redirect rules for every record that resolves to a topic.
///
/// Duplicate aliases point at their target's topic. Records without a topic
/// (never posted, or aliasing an unpublished event) are skipped.
pub fn render_redirects(records: &RecordMap, public_url: &str, prefix: &str) -> String {
    let base = public_url.trim_end_matches('/');
    let prefix = prefix.trim_matches('/');
    let mut out = String::new();

    for (id, record) in records {
        let topic_id = match &record.duplicate_of {
            Some(target) => records.get(target).and_then(|t| t.topic_id),
            None => record.topic_id,
        };
        if let Some(topic_id) = topic_id {
            out.push_str(&format!("/{prefix}/{id} {base}/t/{topic_id} 302\n"));
        }
    }
    out
}

/// Render and write the redirect file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_redirects(
    records: &RecordMap,
    public_url: &str,
    prefix: &str,
    path: &Path,
) -> Result<usize> {
    let rules = render_redirects(records, public_url, prefix);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &rules)?;
    Ok(rules.lines().count())
}

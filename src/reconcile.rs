//! Reconciliation: diff the source event list against the correlation store.
//!
//! [`compute_diff`] performs no I/O. Its only side effect is bookkeeping on
//! the in-memory record map: every event seen in this run gets a record
//! (created empty if needed) stamped with the run marker, which is how
//! disappeared events are detected afterwards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::{Event, PublishRecord};
use crate::store::RecordMap;

/// An already published event whose content or generator changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateItem {
    /// Current source event.
    pub event: Event,
    /// Topic to rewrite.
    pub topic_id: u64,
    /// First post of the topic, if it was recorded.
    pub post_id: Option<u64>,
}

/// An event whose title collides with an earlier event in the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateItem {
    /// The later, colliding event.
    pub event: Event,
    /// Id of the first event seen with this title.
    pub duplicate_of: String,
}

/// A stored record whose event is gone (or every record, in full-wipe mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    /// Event id the record is keyed by.
    pub id: String,
    /// The record as it was when the diff was computed.
    pub record: PublishRecord,
}

/// Operations needed to bring the forum in line with the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Events with no topic yet.
    pub post: Vec<Event>,
    /// Published events that need rewriting.
    pub update: Vec<UpdateItem>,
    /// Records to retract.
    pub delete: Vec<DeleteItem>,
    /// Events to mark as aliases.
    pub duplicates: Vec<DuplicateItem>,
}

impl Diff {
    /// Returns `true` if there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.post.is_empty()
            && self.update.is_empty()
            && self.delete.is_empty()
            && self.duplicates.is_empty()
    }

    /// Total number of operations across all buckets.
    pub fn len(&self) -> usize {
        self.post.len() + self.update.len() + self.delete.len() + self.duplicates.len()
    }
}

/// Compute the diff for one run.
///
/// `now` is the run marker: it must be unique per run and is compared for
/// equality only. In `full_wipe` mode the events are ignored and every
/// stored record is scheduled for deletion.
///
/// Duplicate titles are detected case- and whitespace-insensitively; the
/// first event in source order wins and every later collision points at it.
pub fn compute_diff(
    events: &[Event],
    records: &mut RecordMap,
    now: DateTime<Utc>,
    generator_version: u32,
    full_wipe: bool,
) -> Diff {
    let mut diff = Diff::default();

    if full_wipe {
        diff.delete = records
            .iter()
            .map(|(id, record)| DeleteItem {
                id: id.clone(),
                record: record.clone(),
            })
            .collect();
        return diff;
    }

    let mut seen_titles: HashMap<String, &str> = HashMap::new();

    for event in events {
        let record = records.entry(event.id.clone()).or_default();
        record.run_marker = Some(now);

        let title = event.normalized_title();
        let collision = seen_titles
            .get(&title)
            .copied()
            .filter(|first_id| *first_id != event.id);
        if let Some(first_id) = collision {
            let already_marked =
                record.duplicate_of.as_deref() == Some(first_id) && !record.is_published();
            if !already_marked {
                diff.duplicates.push(DuplicateItem {
                    event: event.clone(),
                    duplicate_of: first_id.to_owned(),
                });
            }
            continue;
        }
        seen_titles.insert(title, &event.id);

        match record.topic_id {
            Some(topic_id) => {
                let stale = record.updated_at != Some(event.updated_at)
                    || record.generator_version != Some(generator_version);
                if stale {
                    diff.update.push(UpdateItem {
                        event: event.clone(),
                        topic_id,
                        post_id: record.post_id,
                    });
                }
            }
            None => diff.post.push(event.clone()),
        }
    }

    diff.delete = records
        .iter()
        .filter(|(_, record)| record.run_marker != Some(now) && !record.is_duplicate())
        .map(|(id, record)| DeleteItem {
            id: id.clone(),
            record: record.clone(),
        })
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    const GEN: u32 = 3;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_570_000_000 + secs, 0).unwrap()
    }

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: id.into(),
            updated_at: at(0),
            title: title.into(),
            description: format!("about {title}"),
            authors: vec!["Ada".into()],
            goals: None,
            track: "Web".into(),
        }
    }

    fn published(topic: u64, updated: DateTime<Utc>, generator: u32) -> PublishRecord {
        PublishRecord {
            topic_id: Some(topic),
            post_id: Some(topic * 10),
            updated_at: Some(updated),
            generator_version: Some(generator),
            run_marker: Some(at(-1000)),
            duplicate_of: None,
        }
    }

    /// Mirror what the orchestrator persists after a successful run.
    fn apply(diff: &Diff, records: &mut RecordMap) {
        let mut next_topic = 100;
        for e in &diff.post {
            let record = records.get_mut(&e.id).unwrap();
            record.topic_id = Some(next_topic);
            record.post_id = Some(next_topic + 1);
            record.updated_at = Some(e.updated_at);
            record.generator_version = Some(GEN);
            record.duplicate_of = None;
            next_topic += 2;
        }
        for item in &diff.update {
            let record = records.get_mut(&item.event.id).unwrap();
            record.updated_at = Some(item.event.updated_at);
            record.generator_version = Some(GEN);
        }
        for item in &diff.delete {
            records.remove(&item.id);
        }
        for item in &diff.duplicates {
            records.insert(
                item.event.id.clone(),
                PublishRecord::duplicate(item.duplicate_of.clone()),
            );
        }
    }

    #[test]
    fn new_events_are_posted_and_stamped() {
        let mut records = RecordMap::new();
        let events = vec![event("a", "Alpha"), event("b", "Beta")];
        let diff = compute_diff(&events, &mut records, at(1), GEN, false);

        let posted: Vec<&str> = diff.post.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(posted, ["a", "b"]);
        assert!(diff.update.is_empty() && diff.delete.is_empty() && diff.duplicates.is_empty());
        assert_eq!(records["a"].run_marker, Some(at(1)));
        assert_eq!(records["b"].run_marker, Some(at(1)));
    }

    #[test]
    fn unchanged_published_event_is_a_no_op() {
        let mut records = RecordMap::new();
        records.insert("a".into(), published(5, at(0), GEN));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);
        assert!(diff.is_empty());
    }

    #[test]
    fn changed_timestamp_triggers_update_with_ids() {
        let mut records = RecordMap::new();
        records.insert("a".into(), published(5, at(-60), GEN));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);

        assert_eq!(diff.update.len(), 1);
        assert_eq!(diff.update[0].topic_id, 5);
        assert_eq!(diff.update[0].post_id, Some(50));
        assert!(diff.post.is_empty());
    }

    #[test]
    fn older_source_timestamp_still_triggers_update() {
        let mut records = RecordMap::new();
        records.insert("a".into(), published(5, at(60), GEN));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);
        assert_eq!(diff.update.len(), 1);
    }

    #[test]
    fn generator_bump_triggers_update() {
        let mut records = RecordMap::new();
        records.insert("a".into(), published(5, at(0), GEN - 1));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);
        assert_eq!(diff.update.len(), 1);
    }

    #[test]
    fn duplicate_title_points_at_first_occurrence() {
        let mut records = RecordMap::new();
        let mut complete = event("second", " INTRO TO RUST ");
        complete.goals = Some("learn".into());
        complete.authors = vec!["Ada".into(), "Grace".into()];
        let events = vec![event("first", "Intro to Rust"), complete];

        let diff = compute_diff(&events, &mut records, at(1), GEN, false);

        assert_eq!(diff.post.len(), 1);
        assert_eq!(diff.post[0].id, "first");
        assert_eq!(diff.duplicates.len(), 1);
        assert_eq!(diff.duplicates[0].event.id, "second");
        assert_eq!(diff.duplicates[0].duplicate_of, "first");
    }

    #[test]
    fn later_collisions_all_point_at_first_id() {
        let mut records = RecordMap::new();
        let events = vec![
            event("a", "Same"),
            event("b", "same"),
            event("c", " SAME"),
        ];
        let diff = compute_diff(&events, &mut records, at(1), GEN, false);
        let targets: Vec<&str> = diff
            .duplicates
            .iter()
            .map(|d| d.duplicate_of.as_str())
            .collect();
        assert_eq!(targets, ["a", "a"]);
    }

    #[test]
    fn published_duplicate_is_routed_to_duplicates_not_update() {
        let mut records = RecordMap::new();
        records.insert("b".into(), published(9, at(-60), GEN));
        let events = vec![event("a", "Same"), event("b", "Same")];
        let diff = compute_diff(&events, &mut records, at(1), GEN, false);
        assert!(diff.update.is_empty());
        assert_eq!(diff.duplicates.len(), 1);
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn disappeared_event_is_deleted() {
        let mut records = RecordMap::new();
        records.insert("gone".into(), published(5, at(0), GEN));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);

        assert_eq!(diff.delete.len(), 1);
        assert_eq!(diff.delete[0].id, "gone");
        assert_eq!(diff.delete[0].record.topic_id, Some(5));
    }

    #[test]
    fn disappeared_duplicate_is_not_deleted() {
        let mut records = RecordMap::new();
        records.insert("alias".into(), PublishRecord::duplicate("a"));
        let diff = compute_diff(&[event("a", "Alpha")], &mut records, at(1), GEN, false);
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn full_wipe_ignores_events_and_deletes_everything() {
        let mut records = RecordMap::new();
        records.insert("a".into(), published(5, at(0), GEN));
        records.insert("alias".into(), PublishRecord::duplicate("a"));
        let events = vec![event("a", "Alpha"), event("new", "New")];

        let diff = compute_diff(&events, &mut records, at(1), GEN, true);

        assert!(diff.post.is_empty() && diff.update.is_empty() && diff.duplicates.is_empty());
        let ids: Vec<&str> = diff.delete.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "alias"]);
        assert!(!records.contains_key("new"));
    }

    #[test]
    fn rerun_after_applying_is_empty() {
        let mut records = RecordMap::new();
        records.insert("gone".into(), published(1, at(0), GEN));
        records.insert("stale".into(), published(2, at(-5), GEN));
        let events = vec![
            event("stale", "Stale"),
            event("new", "New"),
            event("dup", "new "),
        ];

        let first = compute_diff(&events, &mut records, at(1), GEN, false);
        assert_eq!(first.len(), 4);
        apply(&first, &mut records);

        let second = compute_diff(&events, &mut records, at(2), GEN, false);
        assert!(second.is_empty(), "{second:?}");
    }

    #[test]
    fn former_duplicate_with_unique_title_is_posted() {
        let mut records = RecordMap::new();
        records.insert("b".into(), PublishRecord::duplicate("a"));
        let events = vec![event("a", "Alpha"), event("b", "Beta")];
        records.insert("a".into(), published(1, at(0), GEN));

        let diff = compute_diff(&events, &mut records, at(1), GEN, false);
        assert_eq!(diff.post.len(), 1);
        assert_eq!(diff.post[0].id, "b");
    }

    #[test]
    fn duplicate_retargeted_to_new_first_occurrence() {
        let mut records = RecordMap::new();
        records.insert("c".into(), PublishRecord::duplicate("a"));
        let events = vec![event("b", "Same"), event("c", "Same")];
        let diff = compute_diff(&events, &mut records, at(1), GEN, false);
        assert_eq!(diff.duplicates.len(), 1);
        assert_eq!(diff.duplicates[0].duplicate_of, "b");
    }
}

//! End-to-end sync runs against mock Zenkit and Discourse servers, with the
//! correlation store on disk.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use topic_sync::config::{ZenkitFields, ZenkitSettings};
use topic_sync::publish::{DiscourseClient, DiscourseConfig, RetryExecutor, RetryPolicy};
use topic_sync::source::{EventSource, ZenkitSource};
use topic_sync::{
    CorrelationStore, GENERATOR_VERSION, JsonFileStore, Orchestrator, PublishOptions,
    PublishRecord,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_570_000_000 + secs, 0).unwrap()
}

fn zenkit_settings(server: &MockServer) -> ZenkitSettings {
    ZenkitSettings {
        base_url: server.uri(),
        api_key: "zk".into(),
        list_id: "LIST".into(),
        fields: ZenkitFields {
            title: "title_text".into(),
            description: "desc_text".into(),
            authors: "authors_references_sort".into(),
            goals: None,
            track: "track_categories_sort".into(),
            status: None,
        },
        ..ZenkitSettings::default()
    }
}

fn entry(id: &str, title: &str) -> Value {
    json!({
        "shortId": id,
        "updated_at": "2019-09-19T10:13:22.845Z",
        "title_text": title,
        "desc_text": "Bring a laptop",
        "authors_references_sort": [{"displayString": "Ada"}],
        "track_categories_sort": [{"name": "Openness"}]
    })
}

async fn mount_zenkit(server: &MockServer, entries: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/lists/LIST/entries/filter/list"))
        .and(header("Zenkit-API-Key", "zk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listEntries": entries
        })))
        .mount(server)
        .await;
}

fn orchestrator(discourse: &MockServer) -> Orchestrator {
    let client = DiscourseClient::new(DiscourseConfig::new(discourse.uri(), "dk", "system"));
    Orchestrator::new(
        RetryExecutor::new(Arc::new(client), RetryPolicy::default()),
        PublishOptions {
            category_id: 5,
            generator_version: GENERATOR_VERSION,
            reset_bump: true,
            retract_orphaned_duplicates: true,
        },
    )
}

#[tokio::test]
async fn zenkit_source_filters_entries_without_track() {
    let zenkit = MockServer::start().await;
    let mut untracked = entry("b", "No track");
    untracked["track_categories_sort"] = json!([]);
    mount_zenkit(&zenkit, vec![entry("a", "Open Hardware Jam"), untracked]).await;

    let events = ZenkitSource::new(zenkit_settings(&zenkit))
        .fetch()
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "a");
    assert_eq!(events[0].authors, ["Ada"]);
}

#[tokio::test]
async fn zenkit_error_is_source_failure() {
    let zenkit = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&zenkit)
        .await;

    let err = ZenkitSource::new(zenkit_settings(&zenkit))
        .fetch()
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SOURCE_FETCH_FAILED");
}

#[tokio::test]
async fn second_run_with_unchanged_source_sends_nothing() {
    let zenkit = MockServer::start().await;
    let discourse = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("db.json");

    mount_zenkit(
        &zenkit,
        vec![
            entry("a", "Open Hardware Jam"),
            entry("b", "  open hardware JAM"),
        ],
    )
    .await;

    // Only one create across both runs; the duplicate never reaches Discourse.
    Mock::given(method("POST"))
        .and(path("/posts.json"))
        .and(body_partial_json(json!({"title": "Open Hardware Jam", "category": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11,
            "topic_id": 10
        })))
        .expect(1)
        .mount(&discourse)
        .await;

    let source = ZenkitSource::new(zenkit_settings(&zenkit));
    let orchestrator = orchestrator(&discourse);

    let mut store = JsonFileStore::open(&db).unwrap();
    let first = orchestrator
        .sync(&source, &mut store, at(1), false)
        .await
        .unwrap();
    assert_eq!((first.posted, first.duplicates), (1, 1));

    let mut store = JsonFileStore::open(&db).unwrap();
    assert_eq!(store.get("b"), Some(&PublishRecord::duplicate("a")));
    let second = orchestrator
        .sync(&source, &mut store, at(2), false)
        .await
        .unwrap();
    assert_eq!(second, Default::default());
}

#[tokio::test]
async fn applied_mutations_survive_a_later_fatal_failure() {
    let zenkit = MockServer::start().await;
    let discourse = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("db.json");

    // A topic from an earlier run whose event has since disappeared.
    let mut store = JsonFileStore::open(&db).unwrap();
    store.put(
        "gone",
        PublishRecord {
            topic_id: Some(3),
            post_id: Some(4),
            updated_at: Some(at(-100)),
            generator_version: Some(GENERATOR_VERSION),
            run_marker: Some(at(0)),
            duplicate_of: None,
        },
    );
    store.flush().unwrap();

    mount_zenkit(&zenkit, vec![entry("a", "Open Hardware Jam")]).await;
    Mock::given(method("POST"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 21,
            "topic_id": 20
        })))
        .expect(1)
        .mount(&discourse)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/t/3.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&discourse)
        .await;

    let source = ZenkitSource::new(zenkit_settings(&zenkit));
    let err = orchestrator(&discourse)
        .sync(&source, &mut store, at(1), false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REMOTE_FAILED");

    let reloaded = JsonFileStore::open(&db).unwrap();
    assert_eq!(reloaded.get("a").and_then(|r| r.topic_id), Some(20));
    assert_eq!(reloaded.get("a").and_then(|r| r.post_id), Some(21));
    assert_eq!(reloaded.get("gone").and_then(|r| r.topic_id), Some(3));
}

#[tokio::test]
async fn full_wipe_deletes_every_topic() {
    let discourse = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("db.json");

    let mut store = JsonFileStore::open(&db).unwrap();
    for (id, topic) in [("a", 1), ("b", 2)] {
        store.put(
            id,
            PublishRecord {
                topic_id: Some(topic),
                post_id: Some(topic + 100),
                ..PublishRecord::default()
            },
        );
    }
    store.put("c", PublishRecord::duplicate("a"));
    store.flush().unwrap();

    for topic in [1, 2] {
        Mock::given(method("DELETE"))
            .and(path(format!("/t/{topic}.json")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&discourse)
            .await;
    }

    // The source is never consulted in full-wipe mode.
    let unused = MockServer::start().await;
    let source = ZenkitSource::new(zenkit_settings(&unused));
    let report = orchestrator(&discourse)
        .sync(&source, &mut store, at(1), true)
        .await
        .unwrap();

    assert_eq!(report.deleted, 3);
    assert!(JsonFileStore::open(&db).unwrap().records().is_empty());
    assert!(unused.received_requests().await.unwrap_or_default().is_empty());
}

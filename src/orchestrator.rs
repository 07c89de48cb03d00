//! Applies a [`Diff`] to the forum, one item at a time.
//!
//! Buckets run in a fixed order (posts, updates, deletes, duplicate marks)
//! and every applied item is flushed to the store before the next one
//! starts. The first fatal error stops the run; whatever was flushed before
//! it stays in effect.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::model::{Event, PublishRecord};
use crate::publish::{PublishRequest, PublishResponse, RemoteFailure, RetryExecutor};
use crate::reconcile::{self, DeleteItem, Diff, DuplicateItem, UpdateItem};
use crate::render;
use crate::source::EventSource;
use crate::store::CorrelationStore;

/// Publishing behavior that is not part of the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Category new topics go to.
    pub category_id: u64,
    /// Generator version stamped on published records.
    pub generator_version: u32,
    /// Reset the bump date after an update.
    pub reset_bump: bool,
    /// Delete the existing topic of an event that became a duplicate.
    pub retract_orphaned_duplicates: bool,
}

/// Counts of applied operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Topics created.
    pub posted: usize,
    /// Topics rewritten.
    pub updated: usize,
    /// Records retracted.
    pub deleted: usize,
    /// Events marked as duplicates.
    pub duplicates: usize,
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} posted, {} updated, {} deleted, {} duplicates",
            self.posted, self.updated, self.deleted, self.duplicates
        )
    }
}

/// Drives diff buckets through the retry executor.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    executor: RetryExecutor,
    options: PublishOptions,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(executor: RetryExecutor, options: PublishOptions) -> Self {
        Self { executor, options }
    }

    /// Fetch events, compute the diff and apply it.
    ///
    /// In `full_wipe` mode the source is not consulted at all.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. A source failure happens before any
    /// mutation.
    pub async fn sync(
        &self,
        source: &dyn EventSource,
        store: &mut dyn CorrelationStore,
        now: DateTime<Utc>,
        full_wipe: bool,
    ) -> Result<SyncReport> {
        let events = if full_wipe {
            warn!("full wipe requested, retracting every stored record");
            Vec::new()
        } else {
            source.fetch().await?
        };

        let diff = reconcile::compute_diff(
            &events,
            store.records_mut(),
            now,
            self.options.generator_version,
            full_wipe,
        );
        info!(
            post = diff.post.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            duplicates = diff.duplicates.len(),
            "computed diff"
        );

        self.apply(diff, store).await
    }

    /// Apply every bucket of `diff`, flushing after each item.
    ///
    /// # Errors
    ///
    /// Returns the first fatal remote or store error.
    pub async fn apply(&self, diff: Diff, store: &mut dyn CorrelationStore) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for event in diff.post {
            self.post(event, store).await?;
            report.posted += 1;
        }
        for item in diff.update {
            self.update(item, store).await?;
            report.updated += 1;
        }
        for item in diff.delete {
            self.delete(item, store).await?;
            report.deleted += 1;
        }
        for item in diff.duplicates {
            self.mark_duplicate(item, store).await?;
            report.duplicates += 1;
        }

        Ok(report)
    }

    async fn post(&self, event: Event, store: &mut dyn CorrelationStore) -> Result<()> {
        info!(id = %event.id, title = %event.title, "posting");
        let request = PublishRequest::CreateTopic {
            category: self.options.category_id,
            title: event.title.clone(),
            raw: render::post_body(&event),
            tags: render::tags(&event),
        };

        let created = match self.executor.execute(request.clone()).await? {
            PublishResponse::Created(created) => created,
            PublishResponse::Done => {
                return Err(SyncError::Remote {
                    request,
                    failure: RemoteFailure::Decode("create returned no topic".to_owned()),
                });
            }
        };

        let mut record = store.get(&event.id).cloned().unwrap_or_default();
        record.topic_id = Some(created.topic_id);
        record.post_id = Some(created.post_id);
        record.updated_at = Some(event.updated_at);
        record.generator_version = Some(self.options.generator_version);
        record.duplicate_of = None;
        store.put(&event.id, record);
        store.flush()?;

        info!(id = %event.id, topic_id = created.topic_id, post_id = created.post_id, "posted");
        Ok(())
    }

    async fn update(&self, item: UpdateItem, store: &mut dyn CorrelationStore) -> Result<()> {
        let UpdateItem {
            event,
            topic_id,
            post_id,
        } = item;
        info!(id = %event.id, title = %event.title, topic_id, ?post_id, "updating");

        self.executor
            .execute(PublishRequest::UpdateTopic {
                topic_id,
                title: event.title.clone(),
                tags: render::tags(&event),
            })
            .await?;

        match post_id {
            Some(post_id) => {
                self.executor
                    .execute(PublishRequest::UpdatePost {
                        post_id,
                        raw: render::post_body(&event),
                    })
                    .await?;
            }
            None => warn!(id = %event.id, topic_id, "no post id recorded, body left as is"),
        }

        if self.options.reset_bump {
            self.executor
                .execute(PublishRequest::ResetBump { topic_id })
                .await?;
        }

        let mut record = store.get(&event.id).cloned().unwrap_or_default();
        record.updated_at = Some(event.updated_at);
        record.generator_version = Some(self.options.generator_version);
        store.put(&event.id, record);
        store.flush()?;
        Ok(())
    }

    async fn delete(&self, item: DeleteItem, store: &mut dyn CorrelationStore) -> Result<()> {
        match item.record.topic_id {
            Some(topic_id) => {
                info!(id = %item.id, topic_id, "deleting");
                self.delete_topic(topic_id).await?;
            }
            None => info!(id = %item.id, "dropping record without a topic"),
        }
        store.remove(&item.id);
        store.flush()?;
        Ok(())
    }

    async fn mark_duplicate(
        &self,
        item: DuplicateItem,
        store: &mut dyn CorrelationStore,
    ) -> Result<()> {
        info!(
            id = %item.event.id,
            title = %item.event.title,
            duplicate_of = %item.duplicate_of,
            "marking duplicate"
        );

        let orphan = store.get(&item.event.id).and_then(|r| r.topic_id);
        if let Some(topic_id) = orphan {
            if self.options.retract_orphaned_duplicates {
                info!(id = %item.event.id, topic_id, "retracting topic of duplicate");
                self.delete_topic(topic_id).await?;
            } else {
                warn!(
                    id = %item.event.id,
                    topic_id,
                    "duplicate already had a topic; it is no longer tracked"
                );
            }
        }

        store.put(&item.event.id, PublishRecord::duplicate(item.duplicate_of));
        store.flush()?;
        Ok(())
    }

    async fn delete_topic(&self, topic_id: u64) -> Result<()> {
        self.executor
            .execute(PublishRequest::DeleteTopic { topic_id })
            .await?;
        Ok(())
    }
}

//! Event sources.

pub mod zenkit;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Event;

pub use zenkit::ZenkitSource;

/// Produces the normalized event list for a run.
///
/// A failure aborts the run before anything is mutated.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the current events, in source order, ids unique.
    async fn fetch(&self) -> Result<Vec<Event>>;
}

/// A fixed event list.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    events: Vec<Event>,
}

impl StaticSource {
    /// Serve `events` on every fetch.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<Event>> {
        Ok(self.events.clone())
    }
}

//! topic-sync: keeps a Discourse category in sync with a Zenkit event list.
//!
//! Each run is a three-way diff between the current event list, the
//! correlation store of previously published topics, and the run's own
//! marker:
//!
//! EventSource → compute_diff → Diff → Orchestrator → RetryExecutor → forum
//!
//! # Architecture
//!
//! - **source**: fetches and normalizes events (Zenkit)
//! - **reconcile**: pure diff computation, no I/O
//! - **publish**: forum client (Discourse) and the retry executor
//! - **orchestrator**: applies the diff item by item, flushing the store after each
//! - **store**: the persisted correlation store, the run's checkpoint
//! - **render** / **redirect**: post formatting and static redirect generation

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod publish;
pub mod reconcile;
pub mod redirect;
pub mod render;
pub mod source;
pub mod store;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use model::{Event, GENERATOR_VERSION, PublishRecord};
pub use orchestrator::{Orchestrator, PublishOptions, SyncReport};
pub use reconcile::{Diff, compute_diff};
pub use store::{CorrelationStore, JsonFileStore, MemoryStore};

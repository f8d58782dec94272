//! Record source abstraction for the export engine.
//!
//! The [`RecordSource`] trait is the engine's only view of storage: a
//! dataset-kind lookup plus forward-only cursors over conversations and
//! dataset items, each yielding records in ascending id order.
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`SqliteSource`] | Streams rows from the SQLite database |
//! | [`MemorySource`] | In-memory records for tests and embedding |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::{Conversation, DatasetItem, DatasetKind};
use crate::options::{ConversationStatus, ExportOptions, Split};

pub use memory::MemorySource;
pub use sqlite::SqliteSource;

/// Filter applied to conversation cursors.
///
/// Dataset and split are optional; status always applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationFilter {
    pub dataset_id: Option<i64>,
    pub split: Option<Split>,
    pub status: ConversationStatus,
}

impl ConversationFilter {
    pub fn from_options(options: &ExportOptions) -> Self {
        Self {
            dataset_id: options.dataset_filter(),
            split: options.split.split(),
            status: options.status,
        }
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        self.dataset_id
            .map_or(true, |id| conversation.dataset_id == id)
            && self
                .split
                .map_or(true, |split| conversation.split == split.as_str())
            && conversation.status == self.status.as_str()
    }
}

/// Abstract storage backend consumed by the export engine.
///
/// Cursors are lazy: nothing is fetched until the returned stream is
/// polled, and dropping the stream releases whatever it holds.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Resolve a dataset's kind, or `None` if the dataset does not exist.
    async fn dataset_kind(&self, dataset_id: i64) -> Result<Option<DatasetKind>>;

    /// Conversations matching `filter`, with messages, ascending by id.
    fn conversations(&self, filter: ConversationFilter) -> BoxStream<'_, Result<Conversation>>;

    /// Items of one dataset, ascending by id.
    fn items(&self, dataset_id: i64) -> BoxStream<'_, Result<DatasetItem>>;
}

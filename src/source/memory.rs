//! In-memory [`RecordSource`] implementation for testing and embedding.
//!
//! Records live in id-ordered maps behind `std::sync::RwLock`. Cursors walk
//! the maps by key, cloning one record per poll, so records added while a
//! cursor is open show up if their id is past the cursor position.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::models::{Conversation, DatasetItem, DatasetKind};

use super::{ConversationFilter, RecordSource};

/// In-memory record source.
pub struct MemorySource {
    datasets: RwLock<HashMap<i64, DatasetKind>>,
    conversations: RwLock<BTreeMap<i64, Conversation>>,
    items: RwLock<BTreeMap<i64, DatasetItem>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
            conversations: RwLock::new(BTreeMap::new()),
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn add_dataset(&self, id: i64, kind: DatasetKind) {
        self.datasets.write().unwrap().insert(id, kind);
    }

    /// Insert or replace a conversation, keyed by its id.
    pub fn add_conversation(&self, conversation: Conversation) {
        self.conversations
            .write()
            .unwrap()
            .insert(conversation.id, conversation);
    }

    /// Insert or replace an item, keyed by its id.
    pub fn add_item(&self, item: DatasetItem) {
        self.items.write().unwrap().insert(item.id, item);
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk `map` forward from `after`, returning the first record accepted by
/// `keep` together with the bound to resume from.
fn next_after<T: Clone>(
    map: &RwLock<BTreeMap<i64, T>>,
    after: Bound<i64>,
    keep: impl Fn(&T) -> bool,
) -> Result<Option<(i64, T)>> {
    let guard = map
        .read()
        .map_err(|_| anyhow!("memory source lock poisoned"))?;
    Ok(guard
        .range((after, Bound::Unbounded))
        .find(|(_, record)| keep(record))
        .map(|(id, record)| (*id, record.clone())))
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn dataset_kind(&self, dataset_id: i64) -> Result<Option<DatasetKind>> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| anyhow!("memory source lock poisoned"))?;
        Ok(datasets.get(&dataset_id).copied())
    }

    fn conversations(&self, filter: ConversationFilter) -> BoxStream<'_, Result<Conversation>> {
        stream::unfold(Some(Bound::Unbounded), move |cursor| async move {
            let after = cursor?;
            match next_after(&self.conversations, after, |c| filter.matches(c)) {
                Ok(Some((id, conversation))) => {
                    Some((Ok(conversation), Some(Bound::Excluded(id))))
                }
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
        .boxed()
    }

    fn items(&self, dataset_id: i64) -> BoxStream<'_, Result<DatasetItem>> {
        stream::unfold(Some(Bound::Unbounded), move |cursor| async move {
            let after = cursor?;
            match next_after(&self.items, after, |item| item.dataset_id == dataset_id) {
                Ok(Some((id, item))) => Some((Ok(item), Some(Bound::Excluded(id)))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
        .boxed()
    }
}

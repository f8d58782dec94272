//! SQLite-backed [`RecordSource`] implementation.
//!
//! Conversations and items are read with `fetch`, one row at a time, so an
//! export never holds more than the current record. Each conversation row
//! is hydrated with its messages through a second query on another pooled
//! connection while the cursor stays open.

use anyhow::Result;
use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::value::RawValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::models::{Conversation, DatasetItem, DatasetKind, Message, Role};

use super::{ConversationFilter, RecordSource};

const CONVERSATIONS_QUERY: &str = r#"
    SELECT id, dataset_id, split, status, tags, source, notes
    FROM conversations
    WHERE status = ?1
      AND (?2 IS NULL OR dataset_id = ?2)
      AND (?3 IS NULL OR split = ?3)
    ORDER BY id ASC
"#;

const MESSAGES_QUERY: &str = r#"
    SELECT role, name, content, meta
    FROM conversation_messages
    WHERE conversation_id = ?
    ORDER BY idx ASC
"#;

const ITEMS_QUERY: &str = r#"
    SELECT id, dataset_id, data, source_ref
    FROM dataset_items
    WHERE dataset_id = ?
    ORDER BY id ASC
"#;

/// SQLite implementation of the [`RecordSource`] trait.
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn hydrate_conversation(pool: &SqlitePool, row: SqliteRow) -> Result<Conversation> {
    let id: i64 = row.try_get("id")?;
    let tags: Option<String> = row.try_get("tags")?;
    let source: Option<String> = row.try_get("source")?;
    let notes: Option<String> = row.try_get("notes")?;

    Ok(Conversation {
        id,
        dataset_id: row.try_get("dataset_id")?,
        split: row.try_get("split")?,
        status: row.try_get("status")?,
        tags: tags
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default(),
        source: source.unwrap_or_default(),
        notes: notes.unwrap_or_default(),
        messages: load_messages(pool, id).await?,
    })
}

async fn load_messages(pool: &SqlitePool, conversation_id: i64) -> Result<Vec<Message>> {
    let rows = sqlx::query(MESSAGES_QUERY)
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let role: String = row.try_get("role")?;
            let name: Option<String> = row.try_get("name")?;
            let content: Option<String> = row.try_get("content")?;
            let meta: Option<String> = row.try_get("meta")?;
            Ok(Message {
                role: Role::from(role),
                content: content.unwrap_or_default(),
                name: name.unwrap_or_default(),
                meta: meta
                    .filter(|raw| !raw.trim().is_empty())
                    .and_then(|raw| RawValue::from_string(raw).ok()),
            })
        })
        .collect()
}

fn item_from_row(row: &SqliteRow) -> Result<DatasetItem> {
    let source_ref: Option<String> = row.try_get("source_ref")?;
    Ok(DatasetItem {
        id: row.try_get("id")?,
        dataset_id: row.try_get("dataset_id")?,
        data: row.try_get("data")?,
        source_ref: source_ref.unwrap_or_default(),
    })
}

#[async_trait]
impl RecordSource for SqliteSource {
    async fn dataset_kind(&self, dataset_id: i64) -> Result<Option<DatasetKind>> {
        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM datasets WHERE id = ?")
            .bind(dataset_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(kind.as_deref().map(DatasetKind::from_label))
    }

    fn conversations(&self, filter: ConversationFilter) -> BoxStream<'_, Result<Conversation>> {
        debug!(?filter, "opening conversation cursor");
        let pool = &self.pool;
        sqlx::query(CONVERSATIONS_QUERY)
            .bind(filter.status.as_str())
            .bind(filter.dataset_id)
            .bind(filter.split.map(|split| split.as_str()))
            .fetch(pool)
            .map_err(anyhow::Error::from)
            .and_then(move |row| hydrate_conversation(pool, row))
            .boxed()
    }

    fn items(&self, dataset_id: i64) -> BoxStream<'_, Result<DatasetItem>> {
        debug!(dataset_id, "opening item cursor");
        sqlx::query(ITEMS_QUERY)
            .bind(dataset_id)
            .fetch(&self.pool)
            .map_err(anyhow::Error::from)
            .and_then(|row| future::ready(item_from_row(&row)))
            .boxed()
    }
}

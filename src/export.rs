//! Streaming dataset export.
//!
//! Resolves the requested export type against the target dataset's kind
//! into an [`ExportPlan`], then drives one forward cursor over the record
//! source, deriving output records and writing them as NDJSON as they are
//! produced. Generation stops as soon as the `max_examples` cap is met or
//! the cursor runs dry.

use futures::stream::TryStreamExt;
use serde::Serialize;
use serde_json::value::RawValue;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::items::derive_item_pairs;
use crate::models::{DatasetItem, DatasetKind};
use crate::ndjson::{single_line, NdjsonWriter};
use crate::options::{ExportOptions, ExportType};
use crate::pairs::derive_pairs;
use crate::source::{ConversationFilter, RecordSource};

/// Generation mode of one export, resolved once from `(type, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPlan {
    /// Pairs derived from conversations (optionally within one dataset).
    ConversationPairs,
    /// Verbatim conversations.
    Conversations,
    /// Pairs derived from the items of an items dataset.
    ItemPairs { dataset_id: i64 },
    /// Stored item JSON, one value per line.
    Items { dataset_id: i64 },
    /// Stored item JSON wrapped with its metadata.
    ItemsWithMeta { dataset_id: i64 },
}

impl ExportPlan {
    /// Pick the generation mode for `export_type`. `dataset` is the
    /// filtered dataset and its resolved kind, if a filter was given.
    pub fn resolve(
        export_type: ExportType,
        dataset: Option<(i64, DatasetKind)>,
    ) -> Result<Self> {
        match dataset {
            Some((dataset_id, DatasetKind::Items)) => match export_type {
                ExportType::Pairs => Ok(Self::ItemPairs { dataset_id }),
                ExportType::Items => Ok(Self::Items { dataset_id }),
                ExportType::ItemsWithMeta => Ok(Self::ItemsWithMeta { dataset_id }),
                ExportType::Conversations => {
                    Err(ExportError::ConversationsFromItemsDataset { dataset_id })
                }
            },
            Some((dataset_id, DatasetKind::Conversations)) if export_type.is_items_only() => {
                Err(ExportError::ItemsTypeForConversationsDataset {
                    export_type,
                    dataset_id,
                })
            }
            None if export_type.is_items_only() => {
                Err(ExportError::DatasetIdRequired { export_type })
            }
            _ if export_type == ExportType::Conversations => Ok(Self::Conversations),
            _ => Ok(Self::ConversationPairs),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ConversationPairs => "conversation_pairs",
            Self::Conversations => "conversations",
            Self::ItemPairs { .. } => "item_pairs",
            Self::Items { .. } => "items",
            Self::ItemsWithMeta { .. } => "items_with_meta",
        }
    }
}

/// Outcome of a completed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub plan: ExportPlan,
    /// Source records pulled from the cursor.
    pub records_scanned: usize,
    /// NDJSON lines written to the sink.
    pub records_written: usize,
}

impl ExportSummary {
    /// True when the run stopped because `max_examples` was reached.
    pub fn capped(&self, options: &ExportOptions) -> bool {
        options
            .cap()
            .is_some_and(|cap| self.records_written >= cap)
    }
}

/// Validate `options` against the record source and pick the plan.
///
/// Runs before anything is written, so every error it returns is a
/// configuration error.
pub async fn resolve_plan<S>(source: &S, options: &ExportOptions) -> Result<ExportPlan>
where
    S: RecordSource + ?Sized,
{
    let dataset = match options.dataset_filter() {
        Some(id) => {
            let kind = source
                .dataset_kind(id)
                .await
                .map_err(ExportError::Source)?
                .ok_or(ExportError::DatasetNotFound { id })?;
            debug!(dataset_id = id, kind = kind.as_str(), "resolved dataset kind");
            Some((id, kind))
        }
        None => None,
    };
    ExportPlan::resolve(options.export_type, dataset)
}

/// Stream an export of `source` into `sink` as newline-delimited JSON.
///
/// Configuration errors are returned before the first write. Any later
/// error means the sink holds a prefix of complete lines and nothing more.
#[tracing::instrument(
    name = "export",
    skip_all,
    fields(export_type = %options.export_type, dataset_id = ?options.dataset_filter())
)]
pub async fn stream_export<S, W>(
    source: &S,
    options: &ExportOptions,
    sink: W,
) -> Result<ExportSummary>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let plan = resolve_plan(source, options).await?;
    debug!(plan = plan.name(), "resolved export plan");

    let mut run = ExportRun::new(NdjsonWriter::new(sink), options.cap());
    match plan {
        ExportPlan::ConversationPairs => conversation_pairs(&mut run, source, options).await?,
        ExportPlan::Conversations => conversations(&mut run, source, options).await?,
        ExportPlan::ItemPairs { dataset_id } => {
            item_pairs(&mut run, source, dataset_id, options).await?
        }
        ExportPlan::Items { dataset_id } => raw_items(&mut run, source, dataset_id).await?,
        ExportPlan::ItemsWithMeta { dataset_id } => {
            items_with_meta(&mut run, source, dataset_id).await?
        }
    }

    let summary = ExportSummary {
        plan,
        records_scanned: run.scanned,
        records_written: run.written,
    };
    info!(
        plan = plan.name(),
        scanned = summary.records_scanned,
        written = summary.records_written,
        "export finished"
    );
    Ok(summary)
}

/// Per-request generation state: the output writer and the counters that
/// enforce the global cap.
struct ExportRun<W> {
    writer: NdjsonWriter<W>,
    cap: Option<usize>,
    scanned: usize,
    written: usize,
}

impl<W: AsyncWrite + Unpin> ExportRun<W> {
    fn new(writer: NdjsonWriter<W>, cap: Option<usize>) -> Self {
        Self {
            writer,
            cap,
            scanned: 0,
            written: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.written >= cap)
    }

    async fn emit<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        self.writer.write_record(record).await?;
        self.written += 1;
        Ok(())
    }

    async fn emit_raw(&mut self, json: &str) -> Result<()> {
        self.writer.write_raw(json).await?;
        self.written += 1;
        Ok(())
    }
}

async fn conversation_pairs<S, W>(
    run: &mut ExportRun<W>,
    source: &S,
    options: &ExportOptions,
) -> Result<()>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut cursor = source.conversations(ConversationFilter::from_options(options));
    while let Some(conversation) = cursor.try_next().await.map_err(ExportError::Source)? {
        run.scanned += 1;
        for pair in derive_pairs(&conversation.messages, options) {
            run.emit(&pair).await?;
            if run.is_full() {
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn conversations<S, W>(
    run: &mut ExportRun<W>,
    source: &S,
    options: &ExportOptions,
) -> Result<()>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut cursor = source.conversations(ConversationFilter::from_options(options));
    while let Some(conversation) = cursor.try_next().await.map_err(ExportError::Source)? {
        run.scanned += 1;
        run.emit(&conversation).await?;
        if run.is_full() {
            break;
        }
    }
    Ok(())
}

async fn item_pairs<S, W>(
    run: &mut ExportRun<W>,
    source: &S,
    dataset_id: i64,
    options: &ExportOptions,
) -> Result<()>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut cursor = source.items(dataset_id);
    while let Some(item) = cursor.try_next().await.map_err(ExportError::Source)? {
        run.scanned += 1;
        for pair in derive_item_pairs(&item.data, options) {
            run.emit(&pair).await?;
            if run.is_full() {
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn raw_items<S, W>(run: &mut ExportRun<W>, source: &S, dataset_id: i64) -> Result<()>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut cursor = source.items(dataset_id);
    while let Some(item) = cursor.try_next().await.map_err(ExportError::Source)? {
        run.scanned += 1;
        let Some(data) = stored_json(&item) else {
            continue;
        };
        run.emit_raw(single_line(data)?.get()).await?;
        if run.is_full() {
            break;
        }
    }
    Ok(())
}

/// Stored item JSON, or `None` (with a warning) when it does not parse.
fn stored_json(item: &DatasetItem) -> Option<&RawValue> {
    match serde_json::from_str(&item.data) {
        Ok(data) => Some(data),
        Err(err) => {
            warn!(item_id = item.id, error = %err, "skipping item with invalid JSON data");
            None
        }
    }
}

#[derive(Serialize)]
struct ItemWithMeta<'a> {
    id: i64,
    dataset_id: i64,
    source_ref: &'a str,
    data: &'a RawValue,
}

async fn items_with_meta<S, W>(run: &mut ExportRun<W>, source: &S, dataset_id: i64) -> Result<()>
where
    S: RecordSource + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut cursor = source.items(dataset_id);
    while let Some(item) = cursor.try_next().await.map_err(ExportError::Source)? {
        run.scanned += 1;
        let Some(data) = stored_json(&item) else {
            continue;
        };
        let data = single_line(data)?;
        let record = ItemWithMeta {
            id: item.id,
            dataset_id: item.dataset_id,
            source_ref: &item.source_ref,
            data: &data,
        };
        run.emit(&record).await?;
        if run.is_full() {
            break;
        }
    }
    Ok(())
}

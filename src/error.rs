//! Structured error type for the export engine.
//!
//! Configuration errors are raised before a single byte reaches the sink.
//! Everything else can only happen once the stream has started, so callers
//! must be ready for output that ends without a trailing marker.

use std::io;
use thiserror::Error;

use crate::options::ExportType;

#[derive(Error, Debug)]
pub enum ExportError {
    /// `type=conversations` requested against an items dataset.
    #[error("type=conversations is not valid for items dataset {dataset_id}")]
    ConversationsFromItemsDataset { dataset_id: i64 },

    /// An items-only type requested against a conversations dataset.
    #[error("type={export_type} is only valid for items datasets (dataset {dataset_id} holds conversations)")]
    ItemsTypeForConversationsDataset {
        export_type: ExportType,
        dataset_id: i64,
    },

    /// An items-only type requested without a concrete dataset.
    #[error("dataset_id is required for type={export_type} exports")]
    DatasetIdRequired { export_type: ExportType },

    #[error("dataset {id} not found")]
    DatasetNotFound { id: i64 },

    /// The record source failed while opening or advancing a cursor.
    #[error("record source failed: {0:#}")]
    Source(anyhow::Error),

    #[error("failed to encode export record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write export output: {0}")]
    Sink(#[source] io::Error),

    /// The consumer went away mid-stream.
    #[error("export output closed by the consumer")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Classify a sink write failure. Broken pipes and reset connections
    /// mean the consumer hung up, which is not a fault of the export.
    pub fn sink(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::Disconnected,
            _ => Self::Sink(err),
        }
    }

    /// True for errors raised while validating the request, before any
    /// output was produced.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConversationsFromItemsDataset { .. }
                | Self::ItemsTypeForConversationsDataset { .. }
                | Self::DatasetIdRequired { .. }
                | Self::DatasetNotFound { .. }
        )
    }
}

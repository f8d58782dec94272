//! # Datalab
//!
//! Streaming export engine for conversational training datasets.
//!
//! Datalab stores conversations (and schema-free JSON items) grouped into
//! datasets and re-derives them on demand into training-ready NDJSON:
//! supervised `{user, assistant}` pairs with configurable dialogue context,
//! verbatim conversations, or raw items. Output is streamed record by
//! record, so memory stays bounded by a single conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ RecordSource │──▶│ Export           │──▶│ NdjsonWriter │──▶ sink
//! │ SQLite / Mem │   │ plan + cap       │   │ line/flush   │
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!                             │
//!                ┌────────────┴────────────┐
//!                ▼                         ▼
//!          ┌───────────┐           ┌──────────────┐
//!          │   pairs   │◀──────────│    items     │
//!          │ + context │           │ shape parse  │
//!          └───────────┘           └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! datalab init                                   # create database
//! datalab export --context window > train.jsonl  # derive pairs
//! datalab export --type items --dataset-id 3 --output items.jsonl
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`options`] | Export request options |
//! | [`models`] | Core data types |
//! | [`source`] | Record source trait, SQLite and in-memory backends |
//! | [`context`] | Prompt rendering from dialogue history |
//! | [`pairs`] | Pair derivation from messages |
//! | [`items`] | Pair derivation from schema-free items |
//! | [`ndjson`] | Newline-delimited JSON writer |
//! | [`export`] | Export coordinator |
//! | [`error`] | Export error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod export;
pub mod items;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod ndjson;
pub mod options;
pub mod pairs;
pub mod source;

pub use error::ExportError;
pub use export::{stream_export, ExportPlan, ExportSummary};
pub use options::ExportOptions;

//! # Datalab CLI (`datalab`)
//!
//! Thin command-line front end over the export engine.
//!
//! ## Usage
//!
//! ```bash
//! datalab --config ./config/datalab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `datalab init` | Create the SQLite database and schema |
//! | `datalab export` | Stream a derived dataset as NDJSON |
//!
//! ## Examples
//!
//! ```bash
//! # Approved training pairs with a 4-turn context window
//! datalab export --context window --context-turns 4 > train.jsonl
//!
//! # Validation conversations, verbatim
//! datalab export --type conversations --split valid --output out/valid.jsonl
//!
//! # Items of dataset 3 with their metadata
//! datalab export --type items_with_meta --dataset-id 3
//! ```

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use datalab::config::{self, Config};
use datalab::export::resolve_plan;
use datalab::logging::{self, LogConfig};
use datalab::options::{ContextMode, ConversationStatus, ExportType, RoleStyle, SplitFilter};
use datalab::source::SqliteSource;
use datalab::{db, migrate, stream_export, ExportError, ExportOptions, ExportSummary};

/// Datalab CLI: streaming export of conversational training datasets.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with a `[db]` table and an optional `[export]` table of defaults.
#[derive(Parser)]
#[command(
    name = "datalab",
    about = "Datalab: streaming export of conversational training datasets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/datalab.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the datasets, conversations,
    /// conversation_messages and dataset_items tables. Idempotent.
    Init,

    /// Stream an export as newline-delimited JSON.
    ///
    /// Flags left unset fall back to the `[export]` config table, then to
    /// the built-in defaults (pairs, train, approved, no context).
    Export(ExportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Output encoding.
    #[arg(long = "type", value_enum)]
    export_type: Option<ExportType>,

    /// Restrict to one dataset; required for `items` and `items_with_meta`.
    /// `0` means every dataset.
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
    dataset_id: Option<i64>,

    /// Conversation split, or `all`.
    #[arg(long, value_enum)]
    split: Option<SplitFilter>,

    /// Conversation review status.
    #[arg(long, value_enum)]
    status: Option<ConversationStatus>,

    /// Keep system messages in rendered context.
    #[arg(long)]
    include_system: bool,

    /// Prompt context: the paired user turn, a window of turns, or everything.
    #[arg(long, value_enum)]
    context: Option<ContextMode>,

    /// Number of user turns in a `window` context.
    #[arg(long)]
    context_turns: Option<usize>,

    /// Role prefixes in rendered context.
    #[arg(long, value_enum)]
    role_style: Option<RoleStyle>,

    /// Stop after this many records; 0 means unlimited.
    #[arg(long)]
    max_examples: Option<usize>,

    /// Write to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl ExportArgs {
    /// Layer the flags that were given over `base`.
    fn apply(&self, mut base: ExportOptions) -> ExportOptions {
        if let Some(export_type) = self.export_type {
            base.export_type = export_type;
        }
        if let Some(dataset_id) = self.dataset_id {
            base.dataset_id = Some(dataset_id);
        }
        if let Some(split) = self.split {
            base.split = split;
        }
        if let Some(status) = self.status {
            base.status = status;
        }
        if self.include_system {
            base.include_system = true;
        }
        if let Some(context) = self.context {
            base.context = context;
        }
        if let Some(turns) = self.context_turns {
            base.context_turns = turns;
        }
        if let Some(role_style) = self.role_style {
            base.role_style = role_style;
        }
        if let Some(max) = self.max_examples {
            base.max_examples = max;
        }
        base
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(LogConfig { debug: cli.debug })?;

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Export(args) => {
            run_export(&cfg, &args).await?;
        }
    }

    Ok(())
}

async fn run_export(cfg: &Config, args: &ExportArgs) -> anyhow::Result<()> {
    let options = args.apply(cfg.export.clone());
    let pool = db::connect(cfg).await?;
    let source = SqliteSource::new(pool);

    let result = match &args.output {
        Some(path) => {
            // Validate before creating the file so a rejected request leaves nothing behind.
            resolve_plan(&source, &options).await?;
            let file = create_output(path).await?;
            until_interrupted(&source, &options, file).await
        }
        None => until_interrupted(&source, &options, tokio::io::stdout()).await,
    };
    source.pool().close().await;

    match result {
        Ok(Some(summary)) => {
            let target = args
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdout".to_string());
            eprintln!(
                "Exported {} records ({} source records scanned, {}) to {}",
                summary.records_written,
                summary.records_scanned,
                summary.plan.name(),
                target
            );
            Ok(())
        }
        Ok(None) => Err(anyhow!("export interrupted; output is incomplete")),
        Err(ExportError::Disconnected) => {
            debug!("output closed by consumer, stopping export");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

async fn create_output(path: &Path) -> anyhow::Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create output file {}", path.display()))
}

/// Run the export until it completes or Ctrl-C arrives; `None` means it
/// was interrupted.
async fn until_interrupted<W: AsyncWrite + Unpin>(
    source: &SqliteSource,
    options: &ExportOptions,
    sink: W,
) -> Result<Option<ExportSummary>, ExportError> {
    tokio::select! {
        result = stream_export(source, options, sink) => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            warn!("export interrupted");
            Ok(None)
        }
    }
}

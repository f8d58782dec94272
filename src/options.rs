//! Export request options.
//!
//! [`ExportOptions`] is the complete, ephemeral configuration of one export
//! run. It deserializes from the `[export]` table of the config file and is
//! overridden field by field from the command line.

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;

/// Output encoding requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    /// `{user, assistant}` training pairs.
    #[default]
    Pairs,
    /// Verbatim conversations with their messages.
    Conversations,
    /// Stored item JSON, one value per line.
    Items,
    /// Stored item JSON wrapped with its id, dataset and source reference.
    #[value(name = "items_with_meta")]
    ItemsWithMeta,
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Pairs => "pairs",
            ExportType::Conversations => "conversations",
            ExportType::Items => "items",
            ExportType::ItemsWithMeta => "items_with_meta",
        }
    }

    /// Whether this type reads dataset items rather than conversations.
    pub fn is_items_only(&self) -> bool {
        matches!(self, ExportType::Items | ExportType::ItemsWithMeta)
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete conversation split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

/// Split selection for conversation exports; `all` disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SplitFilter {
    #[default]
    Train,
    Valid,
    Test,
    All,
}

impl SplitFilter {
    pub fn split(&self) -> Option<Split> {
        match self {
            SplitFilter::Train => Some(Split::Train),
            SplitFilter::Valid => Some(Split::Valid),
            SplitFilter::Test => Some(Split::Test),
            SplitFilter::All => None,
        }
    }
}

/// Review status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Draft,
    Pending,
    #[default]
    Approved,
    Rejected,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Draft => "draft",
            ConversationStatus::Pending => "pending",
            ConversationStatus::Approved => "approved",
            ConversationStatus::Rejected => "rejected",
            ConversationStatus::Archived => "archived",
        }
    }
}

/// How much dialogue history goes into a derived prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Only the paired user message.
    #[default]
    None,
    /// The last `context_turns` user turns and everything between them.
    Window,
    /// The whole history up to the paired user message.
    Full,
}

/// How rendered context lines are prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RoleStyle {
    /// `System: `, `User: `, `Assistant: ` prefixes.
    #[default]
    Labels,
    /// Bare content.
    Plain,
}

pub const DEFAULT_CONTEXT_TURNS: usize = 6;

/// Full configuration of a single export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportOptions {
    #[serde(rename = "type")]
    pub export_type: ExportType,
    /// Restrict to one dataset. `None` or `0` means every dataset.
    pub dataset_id: Option<i64>,
    pub split: SplitFilter,
    pub status: ConversationStatus,
    pub include_system: bool,
    pub context: ContextMode,
    pub context_turns: usize,
    pub role_style: RoleStyle,
    /// Global cap on emitted records. `0` means unlimited.
    pub max_examples: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_type: ExportType::Pairs,
            dataset_id: None,
            split: SplitFilter::Train,
            status: ConversationStatus::Approved,
            include_system: false,
            context: ContextMode::None,
            context_turns: DEFAULT_CONTEXT_TURNS,
            role_style: RoleStyle::Labels,
            max_examples: 0,
        }
    }
}

impl ExportOptions {
    /// The dataset filter, with non-positive ids treated as "all datasets".
    pub fn dataset_filter(&self) -> Option<i64> {
        self.dataset_id.filter(|id| *id > 0)
    }

    /// The record cap, or `None` when unlimited.
    pub fn cap(&self) -> Option<usize> {
        (self.max_examples > 0).then_some(self.max_examples)
    }
}

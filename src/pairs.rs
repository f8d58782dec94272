//! Supervised pair derivation from multi-turn dialogue.
//!
//! Every assistant turn with content becomes one `(prompt, completion)`
//! pair, matched with the nearest user turn before it. Several assistant
//! turns after a single user turn each produce a pair sharing that prompt.

use serde::Serialize;

use crate::context::render_context;
use crate::models::{Message, Role};
use crate::options::{ContextMode, ExportOptions};

/// A derived training example, serialized as `{"user": .., "assistant": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair {
    pub user: String,
    pub assistant: String,
}

/// Lazily derive pairs from `messages` in a single forward pass.
pub fn derive_pairs<'a>(
    messages: &'a [Message],
    options: &'a ExportOptions,
) -> impl Iterator<Item = Pair> + 'a {
    messages.iter().enumerate().filter_map(move |(idx, msg)| {
        if msg.role != Role::Assistant {
            return None;
        }
        let completion = msg.trimmed();
        if completion.is_empty() {
            return None;
        }
        let user_idx = messages[..idx].iter().rposition(|m| m.role == Role::User)?;
        let prompt = build_prompt(messages, user_idx, options);
        if prompt.is_empty() {
            return None;
        }
        Some(Pair {
            user: prompt,
            assistant: completion.to_string(),
        })
    })
}

fn build_prompt(messages: &[Message], user_idx: usize, options: &ExportOptions) -> String {
    match options.context {
        ContextMode::None => messages[user_idx].trimmed().to_string(),
        ContextMode::Window => render_context(
            messages,
            user_idx,
            options.include_system,
            options.context_turns,
            options.role_style,
        ),
        ContextMode::Full => render_context(
            messages,
            user_idx,
            options.include_system,
            0,
            options.role_style,
        ),
    }
}

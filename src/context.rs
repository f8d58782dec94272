//! Prompt rendering from dialogue history.
//!
//! A prompt is built from a contiguous slice of messages ending at a user
//! turn. The slice is either the whole prefix or a window holding the last
//! `context_turns` user turns; the retained messages are rendered one per
//! line, optionally prefixed with a role label.

use crate::models::{Message, Role};
use crate::options::RoleStyle;

/// Render the prompt for the user message at `upto`.
///
/// `context_turns == 0` selects the full history from message 0. System
/// messages are only kept when `include_system` is set, and messages with
/// blank content are always dropped. Returns an empty string when nothing
/// survives the filters.
pub fn render_context(
    messages: &[Message],
    upto: usize,
    include_system: bool,
    context_turns: usize,
    role_style: RoleStyle,
) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let upto = upto.min(messages.len() - 1);
    let start = window_start(messages, upto, context_turns);

    let mut out = String::new();
    for msg in &messages[start..=upto] {
        if msg.role == Role::System && !include_system {
            continue;
        }
        let content = msg.trimmed();
        if content.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        if role_style == RoleStyle::Labels {
            out.push_str(role_label(&msg.role));
        }
        out.push_str(content);
    }
    out
}

/// Index of the first message in the window ending at `upto`.
fn window_start(messages: &[Message], upto: usize, context_turns: usize) -> usize {
    if context_turns == 0 {
        return 0;
    }
    let mut turns = 0;
    for idx in (0..=upto).rev() {
        if messages[idx].role == Role::User {
            turns += 1;
            if turns >= context_turns {
                return idx;
            }
        }
    }
    0
}

fn role_label(role: &Role) -> &'static str {
    match role {
        Role::System => "System: ",
        Role::Assistant => "Assistant: ",
        Role::User | Role::Other(_) => "User: ",
    }
}

//! Pair derivation from schema-free dataset items.
//!
//! Two item shapes are recognized:
//!
//! | Shape | Example |
//! |-------|---------|
//! | single turn | `{"user": "Hi", "assistant": "Hello"}` |
//! | dialogue | `{"messages": [{"role": "user", "content": "Hi"}, ...]}` |
//!
//! The single-turn shape wins when both are present. Anything else,
//! including invalid JSON, simply yields no pairs.

use serde_json::value::RawValue;
use std::collections::HashMap;

use crate::models::Message;
use crate::options::ExportOptions;
use crate::pairs::{derive_pairs, Pair};

/// A recognized item layout.
#[derive(Debug)]
pub enum ItemShape {
    SingleTurn(Pair),
    Dialogue(Vec<Message>),
}

/// Recognize the shape of stored item JSON. Returns `None` for anything
/// that cannot contribute a pair.
pub fn parse_item(data: &str) -> Option<ItemShape> {
    let fields: HashMap<String, &RawValue> = serde_json::from_str(data).ok()?;

    if let (Some(user), Some(assistant)) = (fields.get("user"), fields.get("assistant")) {
        if let (Ok(user), Ok(assistant)) = (
            serde_json::from_str::<String>(user.get()),
            serde_json::from_str::<String>(assistant.get()),
        ) {
            let user = user.trim();
            let assistant = assistant.trim();
            if !user.is_empty() && !assistant.is_empty() {
                return Some(ItemShape::SingleTurn(Pair {
                    user: user.to_string(),
                    assistant: assistant.to_string(),
                }));
            }
        }
    }

    let messages: Vec<Message> = serde_json::from_str(fields.get("messages")?.get()).ok()?;
    if messages.is_empty() {
        return None;
    }
    Some(ItemShape::Dialogue(messages))
}

/// Derive training pairs from one item's stored JSON.
pub fn derive_item_pairs(data: &str, options: &ExportOptions) -> Vec<Pair> {
    match parse_item(data) {
        Some(ItemShape::SingleTurn(pair)) => vec![pair],
        Some(ItemShape::Dialogue(messages)) => derive_pairs(&messages, options).collect(),
        None => Vec::new(),
    }
}

//! Core data models read by the export engine.
//!
//! These types mirror the rows the storage layer keeps for datasets,
//! conversations, their messages, and schema-free dataset items. The engine
//! only ever reads them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

/// Speaker of a single message.
///
/// Unknown role strings are kept verbatim in [`Role::Other`] so that
/// verbatim exports round-trip what was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(other) => other,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl Default for Role {
    /// A missing role: never a pair anchor.
    fn default() -> Self {
        Role::Other(String::new())
    }
}

/// One turn of a conversation.
///
/// Decoding is lenient: a missing or `null` role, content or name becomes
/// empty rather than rejecting the whole message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Box<RawValue>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: String::new(),
            meta: None,
        }
    }

    /// Content with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.content.trim()
    }
}

/// A stored conversation together with its ordered messages.
///
/// Serializes to the verbatim `conversations` export shape; the owning
/// dataset is not part of that shape.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(skip_serializing)]
    pub dataset_id: i64,
    pub split: String,
    pub status: String,
    pub tags: Vec<String>,
    pub source: String,
    pub notes: String,
    pub messages: Vec<Message>,
}

/// A schema-free dataset item.
///
/// `data` holds the stored JSON text exactly as the storage layer returned
/// it, so raw exports can pass it through without re-encoding.
#[derive(Debug, Clone)]
pub struct DatasetItem {
    pub id: i64,
    pub dataset_id: i64,
    pub data: String,
    pub source_ref: String,
}

/// Classification of a dataset, which gates the legal export types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Items,
    Conversations,
}

impl DatasetKind {
    /// Interpret a stored `kind` label. Anything other than `items`
    /// (case-insensitive) is a conversations dataset.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("items") {
            DatasetKind::Items
        } else {
            DatasetKind::Conversations
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Items => "items",
            DatasetKind::Conversations => "conversations",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_known_and_unknown() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("system"), Role::System);
        assert_eq!(Role::from("tool"), Role::Other("tool".to_string()));
    }

    #[test]
    fn test_message_serialization_omits_empty_optionals() {
        let msg = Message::new(Role::User, "Hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hi"}"#);
    }

    #[test]
    fn test_message_keeps_meta_verbatim() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"tool","content":"x","meta":{"b":1,"a":[2]}}"#)
                .unwrap();
        assert_eq!(msg.role, Role::Other("tool".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"role":"tool","content":"x","meta":{"b":1,"a":[2]}}"#
        );
    }

    #[test]
    fn test_message_tolerates_missing_and_null_fields() {
        let msgs: Vec<Message> = serde_json::from_str(
            r#"[{"content":"stray"},{"role":null,"content":null,"name":null},{"role":"user"}]"#,
        )
        .unwrap();
        assert_eq!(msgs[0].role, Role::Other(String::new()));
        assert_eq!(msgs[0].content, "stray");
        assert_eq!(msgs[1].role, Role::Other(String::new()));
        assert_eq!(msgs[1].content, "");
        assert_eq!(msgs[1].name, "");
        assert_eq!(msgs[2].role, Role::User);
    }

    #[test]
    fn test_conversation_shape_hides_dataset() {
        let conv = Conversation {
            id: 7,
            dataset_id: 3,
            split: "train".to_string(),
            status: "approved".to_string(),
            tags: vec!["greeting".to_string()],
            source: "manual".to_string(),
            notes: String::new(),
            messages: vec![Message::new(Role::User, "Hi")],
        };
        let json = serde_json::to_string(&conv).unwrap();
        assert_eq!(
            json,
            r#"{"id":7,"split":"train","status":"approved","tags":["greeting"],"source":"manual","notes":"","messages":[{"role":"user","content":"Hi"}]}"#
        );
    }

    #[test]
    fn test_dataset_kind_label() {
        assert_eq!(DatasetKind::from_label("items"), DatasetKind::Items);
        assert_eq!(DatasetKind::from_label("ITEMS"), DatasetKind::Items);
        assert_eq!(
            DatasetKind::from_label("conversations"),
            DatasetKind::Conversations
        );
        assert_eq!(DatasetKind::from_label(""), DatasetKind::Conversations);
        assert_eq!(DatasetKind::Items.as_str(), "items");
        assert_eq!(DatasetKind::Conversations.as_str(), "conversations");
    }
}

//! Classification of `codex exec --json` event records.
//!
//! Records are parsed permissively into [`serde_json::Value`] and then viewed
//! through [`Event`], which tags each record with an [`EventKind`]. Unknown or
//! irrelevant record types land in [`EventKind::Unknown`] so every concern can
//! match exhaustively without probing fields speculatively.

use serde_json::{Map, Value};

/// Keys whose string values identify the agent session.
pub const SESSION_ID_KEYS: [&str; 3] = ["session_id", "thread_id", "conversation_id"];

/// Record types that carry a streamed text fragment in `delta` (or `text`).
const OUTPUT_TEXT_TYPES: [&str; 4] = [
    "response.output_text.delta",
    "response.output_text.done",
    "turn.output_text.delta",
    "turn.output_text.done",
];

/// Closed classification of a record by its `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TurnCompleted,
    TurnEnded,
    TurnFailed,
    TurnCancelled,
    Error,
    /// `response_item` wrapping a payload object.
    ResponseItem,
    /// Top-level `message` / `assistant.message` record.
    Message,
    /// One of the `*.output_text.delta|done` streaming records.
    OutputText,
    /// Generic `assistant` / `assistant.delta` streaming record.
    AssistantDelta,
    Unknown,
}

impl EventKind {
    fn from_type(tag: &str) -> Self {
        match tag {
            "turn.completed" => Self::TurnCompleted,
            "turn.ended" => Self::TurnEnded,
            "turn.failed" => Self::TurnFailed,
            "turn.cancelled" => Self::TurnCancelled,
            "error" => Self::Error,
            "response_item" => Self::ResponseItem,
            "message" | "assistant.message" => Self::Message,
            "assistant" | "assistant.delta" => Self::AssistantDelta,
            other if OUTPUT_TEXT_TYPES.contains(&other) => Self::OutputText,
            _ => Self::Unknown,
        }
    }
}

/// A single JSON object record from the event stream.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub kind: EventKind,
    fields: &'a Map<String, Value>,
}

impl<'a> Event<'a> {
    /// View a parsed value as an event. Returns `None` for non-object values.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let fields = value.as_object()?;
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .map_or(EventKind::Unknown, EventKind::from_type);
        Some(Self { kind, fields })
    }

    /// Human-readable message: `message`, then `error.message`, then `payload.message`.
    pub fn message(&self) -> Option<&'a str> {
        non_blank(self.fields.get("message"))
            .or_else(|| nested_message(self.fields, "error"))
            .or_else(|| nested_message(self.fields, "payload"))
    }

    /// Top-level `status` string (used by `turn.ended`).
    pub fn status(&self) -> Option<&'a str> {
        self.fields.get("status").and_then(Value::as_str)
    }

    /// Nested `turn.status` string, present on some record types.
    pub fn turn_status(&self) -> Option<&'a str> {
        self.fields
            .get("turn")
            .and_then(Value::as_object)
            .and_then(|turn| turn.get("status"))
            .and_then(Value::as_str)
    }

    /// Assistant-authored content list, if this record is a finalized assistant message.
    pub fn assistant_content(&self) -> Option<&'a Value> {
        let message = match self.kind {
            EventKind::ResponseItem => self.fields.get("payload")?.as_object()?,
            EventKind::Message => self.fields,
            _ => return None,
        };
        if self.kind == EventKind::ResponseItem
            && message.get("type").and_then(Value::as_str) != Some("message")
        {
            return None;
        }
        if message.get("role").and_then(Value::as_str) != Some("assistant") {
            return None;
        }
        message.get("content")
    }

    /// Streamed text fragment for delta-style records.
    pub fn delta_text(&self) -> Option<&'a str> {
        let (first, second) = match self.kind {
            EventKind::OutputText => ("delta", "text"),
            EventKind::AssistantDelta => ("text", "delta"),
            _ => return None,
        };
        non_blank(self.fields.get(first)).or_else(|| non_blank(self.fields.get(second)))
    }
}

fn nested_message<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    non_blank(fields.get(key)?.as_object()?.get("message"))
}

/// A string value with at least one non-whitespace character, returned untrimmed.
pub(crate) fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Find the first non-empty string stored under one of `keys`, anywhere in `value`.
///
/// Uses an explicit stack instead of recursion. Within an object every direct key
/// is checked before descending; nested containers are visited in document order.
pub fn find_string_value<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    let mut stack: Vec<&Value> = vec![value];
    while let Some(current) = stack.pop() {
        match current {
            Value::Array(items) => {
                stack.extend(items.iter().rev().filter(|item| is_container(item)));
            }
            Value::Object(map) => {
                for (key, child) in map {
                    if keys.contains(&key.as_str())
                        && let Some(found) = child.as_str().filter(|s| !s.is_empty())
                    {
                        return Some(found);
                    }
                }
                stack.extend(map.values().rev().filter(|child| is_container(child)));
            }
            _ => {}
        }
    }
    None
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

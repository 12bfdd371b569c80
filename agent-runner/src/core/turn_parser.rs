//! Reduce one turn of `codex exec --json` output to a single outcome.
//!
//! The parser is a pure function over the captured stdout. Non-JSON lines are
//! expected (Codex interleaves plain text) and skipped. Precedence rules:
//!
//! 1. Any fatal record fails the turn, even if completion was also reported.
//! 2. Without a completion record the turn fails with a fixed diagnostic.
//! 3. Finalized assistant messages supersede streamed deltas.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::events::{Event, EventKind, SESSION_ID_KEYS, find_string_value, non_blank};

pub const TURN_FAILED_DEFAULT: &str = "Codex reported turn.failed";
pub const ERROR_EVENT_DEFAULT: &str = "Codex emitted error event";
pub const TURN_CANCELLED_DEFAULT: &str = "Codex turn was cancelled";
pub const INCOMPLETE_TURN_ERROR: &str = "Codex turn did not report successful completion";

/// Error messages that signal a recoverable condition rather than a failed turn.
static TRANSIENT_ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)^Reconnecting\.\.\.").expect("transient error pattern is valid")]
});

/// Terminal status of a parsed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TurnOutcome {
    /// The turn completed. `assistant_text` is `None` when no text was produced.
    Completed { assistant_text: Option<String> },
    /// The turn failed; no assistant text is ever reported alongside a failure.
    Failed { error: String },
}

/// Outcome of one turn plus the session id observed in its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTurn {
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
}

impl ParsedTurn {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Completed { .. })
    }

    pub fn assistant_text(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Completed { assistant_text } => assistant_text.as_deref(),
            TurnOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TurnOutcome::Completed { .. } => None,
            TurnOutcome::Failed { error } => Some(error),
        }
    }
}

/// Accumulated state while scanning records in order.
#[derive(Debug, Default)]
struct TurnScan {
    session_id: Option<String>,
    fatal_error: Option<String>,
    completed: bool,
    final_parts: Vec<String>,
    delta_parts: Vec<String>,
}

impl TurnScan {
    fn observe(&mut self, value: &Value, event: Event<'_>) {
        if self.session_id.is_none() {
            self.session_id = find_string_value(value, &SESSION_ID_KEYS).map(str::to_owned);
        }
        if self.fatal_error.is_none() {
            self.fatal_error = fatal_error(event);
        }
        if !self.completed {
            self.completed = is_completion(event);
        }
        if let Some(content) = event.assistant_content() {
            collect_content_text(content, &mut self.final_parts);
        }
        if let Some(text) = event.delta_text() {
            self.delta_parts.push(text.to_owned());
        }
    }

    fn finish(self) -> ParsedTurn {
        let outcome = if let Some(error) = self.fatal_error {
            TurnOutcome::Failed { error }
        } else if !self.completed {
            TurnOutcome::Failed {
                error: INCOMPLETE_TURN_ERROR.to_string(),
            }
        } else {
            let parts = if self.final_parts.is_empty() {
                self.delta_parts
            } else {
                self.final_parts
            };
            let text = parts.concat().replace("\r\n", "\n");
            let text = text.trim();
            TurnOutcome::Completed {
                assistant_text: (!text.is_empty()).then(|| text.to_string()),
            }
        };
        ParsedTurn {
            session_id: self.session_id,
            outcome,
        }
    }
}

/// Parse the complete stdout of one `codex exec --json` run.
pub fn parse_turn_output(stdout: &str) -> ParsedTurn {
    let mut scan = TurnScan::default();
    for value in json_records(stdout) {
        if let Some(event) = Event::from_value(&value) {
            scan.observe(&value, event);
        }
    }
    scan.finish()
}

fn json_records(stdout: &str) -> impl Iterator<Item = Value> + '_ {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
}

fn fatal_error(event: Event<'_>) -> Option<String> {
    let message = event.message();
    match event.kind {
        EventKind::TurnFailed => Some(message.unwrap_or(TURN_FAILED_DEFAULT).to_string()),
        EventKind::TurnCancelled => Some(message.unwrap_or(TURN_CANCELLED_DEFAULT).to_string()),
        EventKind::Error => {
            let message = message.unwrap_or(ERROR_EVENT_DEFAULT);
            if is_transient_error(message) {
                None
            } else {
                Some(message.to_string())
            }
        }
        EventKind::TurnCompleted
        | EventKind::TurnEnded
        | EventKind::ResponseItem
        | EventKind::Message
        | EventKind::OutputText
        | EventKind::AssistantDelta
        | EventKind::Unknown => None,
    }
}

fn is_transient_error(message: &str) -> bool {
    TRANSIENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(message))
}

fn is_completion(event: Event<'_>) -> bool {
    match event.kind {
        EventKind::TurnCompleted => true,
        EventKind::TurnEnded => match event.status() {
            Some(status) => is_success_status(status),
            None => event.turn_status().is_some_and(is_success_status),
        },
        _ => event.turn_status().is_some_and(is_success_status),
    }
}

fn is_success_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("completed") || status.eq_ignore_ascii_case("success")
}

/// Collect text fragments from a content list, descending into nested `content` lists.
fn collect_content_text(content: &Value, parts: &mut Vec<String>) {
    let Some(items) = content.as_array() else {
        return;
    };
    for item in items.iter().filter_map(Value::as_object) {
        let is_text = matches!(
            item.get("type").and_then(Value::as_str),
            Some("output_text" | "text")
        );
        if is_text && let Some(text) = non_blank(item.get("text")) {
            parts.push(text.to_owned());
        }
        if let Some(nested) = item.get("content").filter(|c| c.is_array()) {
            collect_content_text(nested, parts);
        }
    }
}

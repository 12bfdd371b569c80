//! Wire types shared between the runner and its host.
//!
//! `TurnInput` arrives once on stdin; `RunnerOutput` records are emitted on
//! stdout between output markers. Field names are `camelCase` on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Initial input document for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnInput {
    pub prompt: String,
    /// Session to resume on the first turn.
    #[serde(default)]
    pub session_id: Option<String>,
    pub group_folder: String,
    pub chat_jid: String,
    pub is_main: bool,
    #[serde(default)]
    pub is_scheduled_task: bool,
    #[serde(default)]
    pub assistant_name: Option<String>,
    /// Environment overrides for the agent process (API keys and similar).
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStatus {
    Success,
    Error,
}

/// One record on the result stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerOutput {
    pub status: OutputStatus,
    /// Assistant text; serialized as `null` when absent.
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunnerOutput {
    pub fn success(result: Option<String>, session_id: Option<String>) -> Self {
        Self {
            status: OutputStatus::Success,
            result,
            new_session_id: session_id,
            error: None,
        }
    }

    /// Text-less success record that only reports the current session.
    pub fn heartbeat(session_id: Option<String>) -> Self {
        Self::success(None, session_id)
    }

    pub fn failure(error: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            status: OutputStatus::Error,
            result: None,
            new_session_id: session_id,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_input_reads_camel_case_with_defaults() {
        let input: TurnInput = serde_json::from_value(json!({
            "prompt": "hi",
            "groupFolder": "main",
            "chatJid": "123@g.us",
            "isMain": true,
        }))
        .expect("parse");

        assert_eq!(input.prompt, "hi");
        assert_eq!(input.session_id, None);
        assert!(input.is_main);
        assert!(!input.is_scheduled_task);
        assert!(input.secrets.is_empty());
    }

    #[test]
    fn turn_input_requires_prompt() {
        let err = serde_json::from_value::<TurnInput>(json!({
            "groupFolder": "main",
            "chatJid": "123@g.us",
            "isMain": false,
        }))
        .unwrap_err();
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn success_output_serializes_null_result_and_omits_error() {
        let value = serde_json::to_value(RunnerOutput::heartbeat(Some("t1".to_string())))
            .expect("serialize");
        assert_eq!(
            value,
            json!({"status": "success", "result": null, "newSessionId": "t1"})
        );
    }

    #[test]
    fn failure_output_without_session_omits_session_field() {
        let value =
            serde_json::to_value(RunnerOutput::failure("boom", None)).expect("serialize");
        assert_eq!(
            value,
            json!({"status": "error", "result": null, "error": "boom"})
        );
    }
}

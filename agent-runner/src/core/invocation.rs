//! Argument construction for `codex exec`.
//!
//! Pure: callers resolve which directories exist and which model to use.

use std::path::PathBuf;

/// Structured JSON output, no git requirement, writes confined to allowed dirs.
const BASE_ARGS: [&str; 5] = [
    "exec",
    "--json",
    "--skip-git-repo-check",
    "--sandbox",
    "workspace-write",
];

/// Cooperating MCP server registered with Codex for each turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Environment passed to the server process, in declaration order.
    pub env: Vec<(String, String)>,
}

impl McpServerSpec {
    /// Encode as `--config key=value` overrides with JSON-encoded values.
    pub fn config_overrides(&self) -> Vec<String> {
        let prefix = format!("mcp_servers.{}", self.name);
        let mut overrides = vec![
            format!("{prefix}.command={}", json_string(&self.command)),
            format!(
                "{prefix}.args={}",
                serde_json::Value::from(self.args.clone())
            ),
        ];
        for (key, value) in &self.env {
            overrides.push(format!("{prefix}.env.{key}={}", json_string(value)));
        }
        overrides
    }
}

/// Everything needed to assemble one `codex exec` argument list.
#[derive(Debug, Clone)]
pub struct CodexInvocation<'a> {
    pub prompt: &'a str,
    /// Prior session to resume; `None` starts a new session.
    pub session_id: Option<&'a str>,
    pub model: Option<&'a str>,
    pub add_dirs: &'a [PathBuf],
    pub mcp_server: &'a McpServerSpec,
}

pub fn build_codex_args(invocation: &CodexInvocation<'_>) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.into_iter().map(String::from).collect();

    if let Some(model) = invocation.model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    for dir in invocation.add_dirs {
        args.push("--add-dir".to_string());
        args.push(dir.display().to_string());
    }

    for override_arg in invocation.mcp_server.config_overrides() {
        args.push("--config".to_string());
        args.push(override_arg);
    }

    if let Some(session_id) = invocation.session_id {
        args.push("resume".to_string());
        args.push(session_id.to_string());
    }
    args.push(invocation.prompt.to_string());
    args
}

fn json_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

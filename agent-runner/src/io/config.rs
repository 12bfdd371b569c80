//! Runner configuration (TOML).
//!
//! Every field has a default matching the container layout, so a missing file
//! or an empty table is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "AGENT_RUNNER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Agent binary to spawn for each turn.
    pub codex_bin: String,

    /// Group workspace; working directory of the agent process.
    pub group_dir: PathBuf,

    /// IPC root shared with the host.
    pub ipc_dir: PathBuf,

    /// Mailbox directory for follow-up messages and the close sentinel.
    pub ipc_input_dir: PathBuf,

    /// Shared project checkout, mounted for primary sessions only.
    pub project_dir: PathBuf,

    /// Shared global directory, mounted for secondary sessions only.
    pub global_dir: PathBuf,

    /// Each existing subdirectory becomes an extra allowed directory.
    pub extra_dir: PathBuf,

    /// Mailbox polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Temp copy of the input document written by the entrypoint. Deleted after
    /// the input is parsed because it holds secrets.
    pub input_temp_file: Option<PathBuf>,

    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct McpConfig {
    /// Server name under `mcp_servers.` in the Codex config.
    pub server_name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Prefix for the context variables (`<PREFIX>_CHAT_JID`, ...).
    pub env_prefix: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: "nanoclaw".to_string(),
            command: "node".to_string(),
            args: vec!["/tmp/dist/ipc-mcp-stdio.js".to_string()],
            env_prefix: "NANOCLAW".to_string(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            codex_bin: "codex".to_string(),
            group_dir: PathBuf::from("/workspace/group"),
            ipc_dir: PathBuf::from("/workspace/ipc"),
            ipc_input_dir: PathBuf::from("/workspace/ipc/input"),
            project_dir: PathBuf::from("/workspace/project"),
            global_dir: PathBuf::from("/workspace/global"),
            extra_dir: PathBuf::from("/workspace/extra"),
            poll_interval_ms: 500,
            input_temp_file: Some(PathBuf::from("/tmp/input.json")),
            mcp: McpConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.codex_bin.trim().is_empty() {
            return Err(anyhow!("codex_bin must be non-empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        if self.mcp.server_name.trim().is_empty() {
            return Err(anyhow!("mcp.server_name must be non-empty"));
        }
        if self.mcp.command.trim().is_empty() {
            return Err(anyhow!("mcp.command must be non-empty"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config path from an explicit flag, then [`CONFIG_ENV_VAR`].
///
/// Returns defaults when neither is set.
pub fn load_config_from(explicit: Option<&Path>) -> Result<RunnerConfig> {
    match explicit {
        Some(path) => load_config(path),
        None => match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => load_config(Path::new(&path)),
            _ => {
                let cfg = RunnerConfig::default();
                cfg.validate()?;
                Ok(cfg)
            }
        },
    }
}

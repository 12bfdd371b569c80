//! Turn execution against the Codex CLI.
//!
//! The [`TurnExecutor`] trait decouples the session loop from the actual agent
//! backend (currently `codex exec`). Tests use scripted executors that return
//! predetermined replies without spawning processes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::invocation::{CodexInvocation, McpServerSpec, build_codex_args};
use crate::core::turn_parser::{TurnOutcome, parse_turn_output};
use crate::core::types::TurnInput;
use crate::io::config::RunnerConfig;
use crate::io::process::{spawn_piped, wait_with_streams};

/// Characters of stderr kept for the error message of a failed process.
pub const STDERR_TAIL_CHARS: usize = 500;

const CANONICAL_API_KEY: &str = "CODEX_API_KEY";
const FALLBACK_API_KEY: &str = "OPENAI_API_KEY";
const MODEL_ENV_VARS: [&str; 2] = ["CODEX_MODEL", "OPENAI_MODEL"];

/// Successful turn: assistant text (possibly absent) and reported session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: Option<String>,
    pub session_id: Option<String>,
}

/// Why a turn failed. Every variant ends the run.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("codex exited with code {}: {}", code_label(.code), tail_label(.stderr_tail))]
    Exit {
        code: Option<i32>,
        stderr_tail: String,
    },
    /// Fatal protocol event or missing completion, message passed through verbatim.
    #[error("{0}")]
    Protocol(String),
    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

fn code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

fn tail_label(tail: &str) -> &str {
    if tail.trim().is_empty() {
        "no stderr"
    } else {
        tail
    }
}

/// Abstraction over agent execution backends.
pub trait TurnExecutor {
    /// Run exactly one turn. Returns only after the agent process has exited.
    fn run_turn(&self, prompt: &str, session_id: Option<&str>) -> Result<TurnReply, TurnError>;
}

/// Executor that spawns `codex exec --json` once per turn.
#[derive(Debug, Clone)]
pub struct CodexExecutor {
    program: String,
    workdir: PathBuf,
    add_dirs: Vec<PathBuf>,
    mcp_server: McpServerSpec,
    env: BTreeMap<String, String>,
}

impl CodexExecutor {
    /// Build an executor for one run.
    ///
    /// `base_env` is normally the host environment; input secrets override it.
    pub fn new(
        config: &RunnerConfig,
        input: &TurnInput,
        base_env: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            program: config.codex_bin.clone(),
            workdir: config.group_dir.clone(),
            add_dirs: allowed_dirs(config, input.is_main),
            mcp_server: mcp_server_spec(config, input),
            env: agent_env(base_env, &input.secrets),
        }
    }

    /// Model override from `CODEX_MODEL`, falling back to `OPENAI_MODEL`.
    pub fn model(&self) -> Option<&str> {
        MODEL_ENV_VARS
            .iter()
            .find_map(|key| self.env.get(*key).filter(|value| !value.is_empty()))
            .map(String::as_str)
    }

    pub fn args(&self, prompt: &str, session_id: Option<&str>) -> Vec<String> {
        build_codex_args(&CodexInvocation {
            prompt,
            session_id,
            model: self.model(),
            add_dirs: &self.add_dirs,
            mcp_server: &self.mcp_server,
        })
    }
}

impl TurnExecutor for CodexExecutor {
    #[instrument(skip_all, fields(session = session_id.unwrap_or("new")))]
    fn run_turn(&self, prompt: &str, session_id: Option<&str>) -> Result<TurnReply, TurnError> {
        let args = self.args(prompt, session_id);
        info!(program = %self.program, args = args.len(), "running codex turn");
        debug!(args = ?args, "codex arguments");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .current_dir(&self.workdir)
            .env_clear()
            .envs(&self.env);

        let child = spawn_piped(&mut cmd).map_err(|source| TurnError::Launch {
            program: self.program.clone(),
            source,
        })?;
        let output = wait_with_streams(child, STDERR_TAIL_CHARS)?;

        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "codex exited unsuccessfully");
            return Err(TurnError::Exit {
                code: output.status.code(),
                stderr_tail: output.stderr_tail,
            });
        }

        let parsed = parse_turn_output(&String::from_utf8_lossy(&output.stdout));
        match parsed.outcome {
            TurnOutcome::Completed { assistant_text } => {
                debug!(
                    session_id = ?parsed.session_id,
                    has_text = assistant_text.is_some(),
                    "codex turn completed"
                );
                Ok(TurnReply {
                    text: assistant_text,
                    session_id: parsed.session_id,
                })
            }
            TurnOutcome::Failed { error } => {
                warn!(error = %error, "codex turn failed");
                Err(TurnError::Protocol(error))
            }
        }
    }
}

/// Directories Codex may write to, in a stable order without duplicates.
///
/// The group workspace and IPC directory are always included. Primary sessions
/// get the project directory, others the global directory (each only if it
/// exists), followed by every subdirectory of the extra-mounts root.
pub fn allowed_dirs(config: &RunnerConfig, is_main: bool) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    push_unique(&mut dirs, config.group_dir.clone());
    push_unique(&mut dirs, config.ipc_dir.clone());

    let shared = if is_main {
        &config.project_dir
    } else {
        &config.global_dir
    };
    if shared.is_dir() {
        push_unique(&mut dirs, shared.clone());
    }

    for extra in extra_mounts(&config.extra_dir) {
        push_unique(&mut dirs, extra);
    }
    dirs
}

fn extra_mounts(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %root.display(), err = %err, "failed to list extra mounts");
            return Vec::new();
        }
    };
    let mut mounts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect();
    mounts.sort();
    mounts
}

fn push_unique(dirs: &mut Vec<PathBuf>, dir: PathBuf) {
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

fn mcp_server_spec(config: &RunnerConfig, input: &TurnInput) -> McpServerSpec {
    let prefix = &config.mcp.env_prefix;
    McpServerSpec {
        name: config.mcp.server_name.clone(),
        command: config.mcp.command.clone(),
        args: config.mcp.args.clone(),
        env: vec![
            (format!("{prefix}_CHAT_JID"), input.chat_jid.clone()),
            (format!("{prefix}_GROUP_FOLDER"), input.group_folder.clone()),
            (
                format!("{prefix}_IS_MAIN"),
                if input.is_main { "1" } else { "0" }.to_string(),
            ),
        ],
    }
}

/// Host environment, skipping variables that are not valid UTF-8.
pub fn host_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Merge the base environment with secrets and normalize the API key name.
pub fn agent_env(
    base: impl IntoIterator<Item = (String, String)>,
    secrets: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = base.into_iter().collect();
    env.extend(secrets.iter().map(|(k, v)| (k.clone(), v.clone())));

    let has_canonical = env
        .get(CANONICAL_API_KEY)
        .is_some_and(|value| !value.is_empty());
    if !has_canonical
        && let Some(fallback) = env
            .get(FALLBACK_API_KEY)
            .filter(|value| !value.is_empty())
            .cloned()
    {
        env.insert(CANONICAL_API_KEY.to_string(), fallback);
    }
    env
}

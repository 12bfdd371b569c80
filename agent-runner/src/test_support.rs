//! Test-only helpers: scripted collaborators, fixtures, and a fake `codex` binary.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::types::TurnInput;
use crate::io::config::RunnerConfig;
use crate::io::executor::{TurnError, TurnExecutor, TurnReply};
use crate::io::mailbox::{Inbox, NextInput};

/// Join JSON values into newline-delimited output, as `codex exec --json` prints it.
pub fn jsonl(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic input for the main group.
pub fn sample_input(prompt: &str) -> TurnInput {
    TurnInput {
        prompt: prompt.to_string(),
        session_id: None,
        group_folder: "test-group".to_string(),
        chat_jid: "test@g.us".to_string(),
        is_main: true,
        is_scheduled_task: false,
        assistant_name: None,
        secrets: Default::default(),
    }
}

/// Config rooted under `root`, with the group and IPC directories created.
///
/// Project, global and extra directories are left for tests to create.
pub fn test_config(root: &Path) -> RunnerConfig {
    let workspace = root.join("workspace");
    let config = RunnerConfig {
        group_dir: workspace.join("group"),
        ipc_dir: workspace.join("ipc"),
        ipc_input_dir: workspace.join("ipc").join("input"),
        project_dir: workspace.join("project"),
        global_dir: workspace.join("global"),
        extra_dir: workspace.join("extra"),
        poll_interval_ms: 10,
        input_temp_file: None,
        ..RunnerConfig::default()
    };
    fs::create_dir_all(&config.group_dir).expect("create group dir");
    fs::create_dir_all(&config.ipc_input_dir).expect("create ipc input dir");
    config
}

/// Temporary workspace that owns its directory for the life of a test.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
    pub config: RunnerConfig,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        Ok(Self { dir, config })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Install a fake `codex` script and point the config at it.
    #[cfg(unix)]
    pub fn install_fake_codex(&mut self, body: &str) -> PathBuf {
        let path = write_fake_codex(self.dir.path(), body);
        self.config.codex_bin = path.display().to_string();
        path
    }
}

/// Write an executable `/bin/sh` script standing in for the Codex CLI.
#[cfg(unix)]
pub fn write_fake_codex(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-codex");
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write fake codex");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake codex");
    path
}

/// Executor that replays queued replies and records every call.
pub struct ScriptedExecutor {
    replies: RefCell<VecDeque<Result<TurnReply, TurnError>>>,
    calls: RefCell<Vec<(String, Option<String>)>>,
}

impl ScriptedExecutor {
    pub fn new(replies: Vec<Result<TurnReply, TurnError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// `(prompt, session_id)` for each turn, in order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.borrow().clone()
    }
}

impl TurnExecutor for ScriptedExecutor {
    fn run_turn(&self, prompt: &str, session_id: Option<&str>) -> Result<TurnReply, TurnError> {
        self.calls
            .borrow_mut()
            .push((prompt.to_string(), session_id.map(str::to_string)));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TurnError::Protocol("scripted executor exhausted".to_string())))
    }
}

/// Inbox with a fixed startup backlog and a queue of wait results.
pub struct ScriptedInbox {
    pending: Vec<String>,
    waits: VecDeque<NextInput>,
    wait_calls: u32,
}

impl ScriptedInbox {
    pub fn new(pending: Vec<String>, waits: Vec<NextInput>) -> Self {
        Self {
            pending,
            waits: waits.into(),
            wait_calls: 0,
        }
    }

    pub fn waits(&self) -> u32 {
        self.wait_calls
    }
}

impl Inbox for ScriptedInbox {
    fn drain_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    fn wait_for_input(&mut self) -> Result<NextInput> {
        self.wait_calls += 1;
        self.waits
            .pop_front()
            .ok_or_else(|| anyhow!("scripted inbox exhausted"))
    }
}

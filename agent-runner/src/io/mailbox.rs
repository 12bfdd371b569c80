//! Filesystem mailbox for follow-up messages from the host.
//!
//! The host drops `*.json` files into the input directory, one message each:
//!
//! ```json
//! {"type": "message", "text": "follow-up question"}
//! ```
//!
//! Files are consumed in filename order and deleted as soon as they are read,
//! valid or not, so nothing is ever delivered twice. An empty `_close` file
//! asks the run to end; it is removed when seen.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const CLOSE_SENTINEL: &str = "_close";
const MESSAGE_SUFFIX: &str = ".json";
const MESSAGE_TYPE: &str = "message";

/// Result of waiting on the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextInput {
    /// One or more messages, newline-joined in delivery order.
    Message(String),
    /// The host asked the run to end.
    Closed,
}

/// Source of follow-up input for the session loop.
pub trait Inbox {
    /// Consume every message currently queued, without waiting.
    fn drain_pending(&mut self) -> Vec<String>;

    /// Block until a message arrives or the host signals close.
    fn wait_for_input(&mut self) -> Result<NextInput>;
}

#[derive(Debug, Deserialize)]
struct MessageFile {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Polled mailbox backed by a directory.
#[derive(Debug, Clone)]
pub struct FsMailbox {
    dir: PathBuf,
    poll_interval: Duration,
}

impl FsMailbox {
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn close_sentinel_path(&self) -> PathBuf {
        self.dir.join(CLOSE_SENTINEL)
    }

    /// Create the directory and remove a sentinel left over from a previous run.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create mailbox dir {}", self.dir.display()))?;
        let sentinel = self.close_sentinel_path();
        match fs::remove_file(&sentinel) {
            Ok(()) => info!(path = %sentinel.display(), "removed stale close sentinel"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %sentinel.display(), err = %err, "failed to remove stale close sentinel");
            }
        }
        Ok(())
    }

    /// True if the close sentinel is present. The sentinel is deleted when seen.
    pub fn take_close_signal(&self) -> bool {
        let sentinel = self.close_sentinel_path();
        if !sentinel.exists() {
            return false;
        }
        if let Err(err) = fs::remove_file(&sentinel) {
            warn!(path = %sentinel.display(), err = %err, "failed to remove close sentinel");
        }
        true
    }

    /// Read and delete all queued message files in filename order.
    ///
    /// Malformed files are logged and discarded. Directory-level failures are
    /// logged and yield no messages.
    pub fn drain(&self) -> Vec<String> {
        match self.drain_inner() {
            Ok(messages) => messages,
            Err(err) => {
                warn!(dir = %self.dir.display(), err = %format!("{err:#}"), "mailbox drain failed");
                Vec::new()
            }
        }
    }

    fn drain_inner(&self) -> Result<Vec<String>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create mailbox dir {}", self.dir.display()))?;
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .with_context(|| format!("list mailbox dir {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(MESSAGE_SUFFIX))
            .collect();
        names.sort();

        let mut messages = Vec::new();
        for name in names {
            let path = self.dir.join(&name);
            let read = read_message_file(&path);
            discard(&path);
            match read {
                Ok(text) => messages.push(text),
                Err(err) => {
                    warn!(file = %name, err = %format!("{err:#}"), "discarding mailbox file");
                }
            }
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), "drained mailbox messages");
        }
        Ok(messages)
    }
}

impl Inbox for FsMailbox {
    fn drain_pending(&mut self) -> Vec<String> {
        self.drain()
    }

    fn wait_for_input(&mut self) -> Result<NextInput> {
        loop {
            if self.take_close_signal() {
                return Ok(NextInput::Closed);
            }
            let messages = self.drain();
            if !messages.is_empty() {
                return Ok(NextInput::Message(messages.join("\n")));
            }
            thread::sleep(self.poll_interval);
        }
    }
}

fn read_message_file(path: &Path) -> Result<String> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let message: MessageFile =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    if message.kind != MESSAGE_TYPE {
        return Err(anyhow!("unexpected message type {:?}", message.kind));
    }
    match message.text {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(anyhow!("message has no text")),
    }
}

fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), err = %err, "failed to delete mailbox file");
    }
}

//! Helpers for running child processes with captured output.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    /// Last characters written to stderr (bounded; the full stream goes to the log).
    pub stderr_tail: String,
}

/// Spawn `cmd` with no stdin and both output streams piped.
///
/// The spawn error is returned untouched so callers can tell a launch failure
/// apart from a failure while the child runs.
pub fn spawn_piped(cmd: &mut Command) -> std::io::Result<Child> {
    debug!("spawning child process");
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Wait for `child` to exit while draining stdout and stderr concurrently.
///
/// Stdout is collected in full. Each stderr line is forwarded to the log as it
/// arrives and only the last `stderr_tail_chars` characters are kept.
#[instrument(skip_all, fields(pid = child.id()))]
pub fn wait_with_streams(mut child: Child, stderr_tail_chars: usize) -> Result<CommandOutput> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream(stdout));
    let stderr_handle = thread::spawn(move || forward_stderr(stderr, stderr_tail_chars));

    let status = child.wait().context("wait for command")?;

    let stdout = join_reader(stdout_handle).context("join stdout")?;
    let stderr_tail = join_reader(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), stdout_bytes = stdout.len(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr_tail,
    })
}

fn join_reader<T>(handle: thread::JoinHandle<Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("read output")?;
    Ok(buf)
}

fn forward_stderr<R: Read>(reader: R, tail_chars: usize) -> Result<String> {
    let mut buf_reader = BufReader::new(reader);
    let mut tail = String::new();

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read stderr line")?;
        if n == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            info!(target: "codex", stream = "stderr", "{trimmed}");
        }

        tail.push_str(&text);
        // Compact occasionally; the exact cut happens once the stream ends.
        if tail.len() > tail_chars.saturating_mul(4).max(4096) {
            tail = last_chars(&tail, tail_chars).to_string();
        }
    }

    Ok(last_chars(&tail, tail_chars).to_string())
}

/// Suffix of `text` holding at most `max_chars` characters.
pub fn last_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map_or(text.len(), |(idx, _)| idx);
    &text[start..]
}

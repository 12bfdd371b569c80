//! Marker-delimited result records on stdout.
//!
//! Diagnostics go to stderr through `tracing`, so the host can scan stdout for
//! marker pairs without tripping over log lines.

use std::io::Write;

use anyhow::{Context, Result};

use crate::core::types::RunnerOutput;

pub const OUTPUT_START_MARKER: &str = "---NANOCLAW_OUTPUT_START---";
pub const OUTPUT_END_MARKER: &str = "---NANOCLAW_OUTPUT_END---";

/// Writer for result records.
#[derive(Debug)]
pub struct OutputChannel<W: Write> {
    writer: W,
}

impl<W: Write> OutputChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one record as start marker, compact JSON line, end marker; then flush.
    pub fn emit(&mut self, output: &RunnerOutput) -> Result<()> {
        let payload = serde_json::to_string(output).context("serialize runner output")?;
        writeln!(self.writer, "{OUTPUT_START_MARKER}\n{payload}\n{OUTPUT_END_MARKER}")
            .context("write runner output")?;
        self.writer.flush().context("flush runner output")
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Extract every marker-delimited payload from captured stdout.
///
/// Lines outside marker pairs are ignored; an unterminated record is dropped.
pub fn extract_payloads(stdout: &str) -> Vec<&str> {
    let mut payloads = Vec::new();
    let mut inside = false;
    for line in stdout.lines() {
        match line {
            OUTPUT_START_MARKER => inside = true,
            OUTPUT_END_MARKER => inside = false,
            payload if inside => payloads.push(payload),
            _ => {}
        }
    }
    payloads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_wraps_record_in_markers() {
        let mut channel = OutputChannel::new(Vec::new());
        channel
            .emit(&RunnerOutput::success(
                Some("Hi".to_string()),
                Some("t1".to_string()),
            ))
            .expect("emit");

        let written = String::from_utf8(channel.into_inner()).expect("utf8");
        assert_eq!(
            written,
            "---NANOCLAW_OUTPUT_START---\n\
             {\"status\":\"success\",\"result\":\"Hi\",\"newSessionId\":\"t1\"}\n\
             ---NANOCLAW_OUTPUT_END---\n"
        );
    }

    #[test]
    fn multiline_results_stay_on_one_payload_line() {
        let mut channel = OutputChannel::new(Vec::new());
        channel
            .emit(&RunnerOutput::success(Some("a\nb".to_string()), None))
            .expect("emit");

        let written = String::from_utf8(channel.into_inner()).expect("utf8");
        assert_eq!(written.lines().count(), 3);
    }

    #[test]
    fn extract_payloads_ignores_interleaved_noise() {
        let mut channel = OutputChannel::new(Vec::new());
        channel
            .emit(&RunnerOutput::success(Some("first".to_string()), None))
            .expect("emit");
        channel
            .emit(&RunnerOutput::failure("boom", None))
            .expect("emit");
        let mut captured = String::from("stray log line\n");
        captured.push_str(&String::from_utf8(channel.into_inner()).expect("utf8"));
        captured.push_str("trailing noise\n");

        let payloads: Vec<RunnerOutput> = extract_payloads(&captured)
            .into_iter()
            .map(|line| serde_json::from_str(line).expect("payload json"))
            .collect();
        assert_eq!(
            payloads,
            vec![
                RunnerOutput::success(Some("first".to_string()), None),
                RunnerOutput::failure("boom", None),
            ]
        );
    }
}

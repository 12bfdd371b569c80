//! Multi-turn session loop.
//!
//! Runs one turn, emits its result, then waits on the mailbox for the next
//! prompt. Exactly one agent process is alive at a time; messages that arrive
//! mid-turn wait in the mailbox until the next poll.

use std::io::Write;

use anyhow::Result;
use tracing::{error, info};

use crate::core::prompt::initial_prompt;
use crate::core::types::{RunnerOutput, TurnInput};
use crate::io::executor::TurnExecutor;
use crate::io::mailbox::{Inbox, NextInput};
use crate::io::output::OutputChannel;

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The host wrote the close sentinel.
    Closed,
    /// A turn failed; the error record has been emitted.
    Failed { error: String },
}

/// Summary of a session run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Turns that completed successfully.
    pub turns: u32,
    /// Last known session id.
    pub session_id: Option<String>,
    pub stop: LoopStop,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.stop == LoopStop::Closed
    }
}

/// Drive turns until the mailbox closes or a turn fails.
///
/// `instructions` is prepended to the first prompt only. Any messages already
/// queued in the mailbox are appended to the first prompt.
///
/// Errors are returned only when the output channel itself fails.
pub fn run_session<E, I, W>(
    input: &TurnInput,
    instructions: Option<&str>,
    executor: &E,
    inbox: &mut I,
    output: &mut OutputChannel<W>,
) -> Result<SessionOutcome>
where
    E: TurnExecutor,
    I: Inbox,
    W: Write,
{
    let pending = inbox.drain_pending();
    if !pending.is_empty() {
        info!(
            count = pending.len(),
            "draining pending messages into initial prompt"
        );
    }
    let mut prompt = initial_prompt(
        &input.prompt,
        input.is_scheduled_task,
        instructions,
        &pending,
    );
    let mut session_id = input.session_id.clone();
    let mut turns = 0u32;

    loop {
        info!(
            session = session_id.as_deref().unwrap_or("new"),
            "starting turn"
        );
        match executor.run_turn(&prompt, session_id.as_deref()) {
            Ok(reply) => {
                turns += 1;
                if reply.session_id.is_some() {
                    session_id = reply.session_id;
                }
                output.emit(&RunnerOutput::success(reply.text, session_id.clone()))?;
                output.emit(&RunnerOutput::heartbeat(session_id.clone()))?;
            }
            Err(err) => {
                let message = err.to_string();
                error!(error = %message, "agent turn failed");
                output.emit(&RunnerOutput::failure(message.clone(), session_id.clone()))?;
                return Ok(SessionOutcome {
                    turns,
                    session_id,
                    stop: LoopStop::Failed { error: message },
                });
            }
        }

        info!("turn ended, waiting for next message");
        match inbox.wait_for_input()? {
            NextInput::Closed => {
                info!("close sentinel received, exiting");
                return Ok(SessionOutcome {
                    turns,
                    session_id,
                    stop: LoopStop::Closed,
                });
            }
            NextInput::Message(text) => {
                info!(chars = text.len(), "got new message, starting next turn");
                prompt = text;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::executor::{TurnError, TurnReply};
    use crate::io::output::extract_payloads;
    use crate::test_support::{ScriptedExecutor, ScriptedInbox, sample_input};

    fn reply(text: Option<&str>, session_id: Option<&str>) -> Result<TurnReply, TurnError> {
        Ok(TurnReply {
            text: text.map(str::to_string),
            session_id: session_id.map(str::to_string),
        })
    }

    fn records(output: OutputChannel<Vec<u8>>) -> Vec<RunnerOutput> {
        let written = String::from_utf8(output.into_inner()).expect("utf8");
        extract_payloads(&written)
            .into_iter()
            .map(|line| serde_json::from_str(line).expect("record"))
            .collect()
    }

    #[test]
    fn single_turn_then_close_emits_result_and_heartbeat() {
        let executor = ScriptedExecutor::new(vec![reply(Some("Hi"), Some("t1"))]);
        let mut inbox = ScriptedInbox::new(Vec::new(), vec![NextInput::Closed]);
        let mut output = OutputChannel::new(Vec::new());

        let outcome = run_session(
            &sample_input("hello"),
            None,
            &executor,
            &mut inbox,
            &mut output,
        )
        .expect("session");

        assert!(outcome.is_success());
        assert_eq!(outcome.turns, 1);
        assert_eq!(outcome.session_id.as_deref(), Some("t1"));
        assert_eq!(
            records(output),
            vec![
                RunnerOutput::success(Some("Hi".to_string()), Some("t1".to_string())),
                RunnerOutput::heartbeat(Some("t1".to_string())),
            ]
        );
        assert_eq!(executor.calls(), vec![("hello".to_string(), None)]);
    }

    #[test]
    fn session_id_carries_forward_until_replaced() {
        let executor = ScriptedExecutor::new(vec![
            reply(Some("one"), Some("t1")),
            reply(None, None),
            reply(Some("three"), Some("t2")),
        ]);
        let mut inbox = ScriptedInbox::new(
            Vec::new(),
            vec![
                NextInput::Message("second".to_string()),
                NextInput::Message("third".to_string()),
                NextInput::Closed,
            ],
        );
        let mut output = OutputChannel::new(Vec::new());

        let mut input = sample_input("first");
        input.session_id = Some("t0".to_string());
        let outcome = run_session(&input, None, &executor, &mut inbox, &mut output)
            .expect("session");

        assert_eq!(outcome.turns, 3);
        assert_eq!(outcome.session_id.as_deref(), Some("t2"));
        assert_eq!(
            executor.calls(),
            vec![
                ("first".to_string(), Some("t0".to_string())),
                ("second".to_string(), Some("t1".to_string())),
                ("third".to_string(), Some("t1".to_string())),
            ]
        );
        let records = records(output);
        assert_eq!(records.len(), 6);
        assert_eq!(
            records[2],
            RunnerOutput::success(None, Some("t1".to_string()))
        );
    }

    #[test]
    fn failure_emits_error_with_last_session_and_stops() {
        let executor = ScriptedExecutor::new(vec![
            reply(Some("ok"), Some("t1")),
            Err(TurnError::Protocol("model failure".to_string())),
        ]);
        let mut inbox = ScriptedInbox::new(
            Vec::new(),
            vec![NextInput::Message("again".to_string())],
        );
        let mut output = OutputChannel::new(Vec::new());

        let outcome = run_session(
            &sample_input("hello"),
            None,
            &executor,
            &mut inbox,
            &mut output,
        )
        .expect("session");

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.stop,
            LoopStop::Failed {
                error: "model failure".to_string()
            }
        );
        let records = records(output);
        assert_eq!(
            records.last(),
            Some(&RunnerOutput::failure("model failure", Some("t1".to_string())))
        );
        assert!(records.last().unwrap().result.is_none());
    }

    #[test]
    fn first_turn_failure_reports_input_session() {
        let executor = ScriptedExecutor::new(vec![Err(TurnError::Exit {
            code: Some(1),
            stderr_tail: String::new(),
        })]);
        let mut inbox = ScriptedInbox::new(Vec::new(), Vec::new());
        let mut output = OutputChannel::new(Vec::new());
        let mut input = sample_input("hello");
        input.session_id = Some("resumed".to_string());

        let outcome =
            run_session(&input, None, &executor, &mut inbox, &mut output).expect("session");

        assert_eq!(outcome.turns, 0);
        assert_eq!(
            records(output),
            vec![RunnerOutput::failure(
                "codex exited with code 1: no stderr",
                Some("resumed".to_string())
            )]
        );
        assert_eq!(inbox.waits(), 0);
    }

    #[test]
    fn first_prompt_gets_context_and_pending_but_follow_ups_are_verbatim() {
        let executor = ScriptedExecutor::new(vec![
            reply(Some("a"), Some("t1")),
            reply(Some("b"), None),
        ]);
        let mut inbox = ScriptedInbox::new(
            vec!["queued early".to_string()],
            vec![NextInput::Message("follow up".to_string()), NextInput::Closed],
        );
        let mut output = OutputChannel::new(Vec::new());
        let mut input = sample_input("hello");
        input.is_scheduled_task = true;

        run_session(&input, Some("CTX"), &executor, &mut inbox, &mut output).expect("session");

        let calls = executor.calls();
        assert_eq!(
            calls[0].0,
            initial_prompt("hello", true, Some("CTX"), &["queued early".to_string()])
        );
        assert!(calls[0].0.starts_with("CTX\n\nUser request:\n[SCHEDULED TASK"));
        assert!(calls[0].0.ends_with("hello\nqueued early"));
        assert_eq!(calls[1].0, "follow up");
    }
}

//! Session lifecycle tests against a real mailbox directory and a fake `codex`.
//!
//! The fake agent script plays the host's part as well: after the first turn it
//! drops a follow-up message into the mailbox, after the second it writes the
//! close sentinel. That keeps the tests free of timing-dependent writer threads.
#![cfg(unix)]

use std::fs;
use std::path::Path;

use agent_runner::core::types::RunnerOutput;
use agent_runner::io::executor::CodexExecutor;
use agent_runner::io::mailbox::{CLOSE_SENTINEL, FsMailbox};
use agent_runner::io::output::{OutputChannel, extract_payloads};
use agent_runner::session::{LoopStop, run_session};
use agent_runner::test_support::{TestWorkspace, sample_input};

fn path_env() -> Vec<(String, String)> {
    std::env::var("PATH")
        .map(|path| vec![("PATH".to_string(), path)])
        .unwrap_or_default()
}

/// Fake agent: counts turns, records its arguments per turn, and feeds the mailbox.
fn two_turn_script(root: &Path, inbox: &Path) -> String {
    let root = root.display();
    let inbox = inbox.display();
    format!(
        r#"n=$(( $(cat "{root}/count" 2>/dev/null || echo 0) + 1 ))
echo "$n" > "{root}/count"
printf '%s\n' "$@" > "{root}/args-$n"
if [ "$n" = 1 ]; then
  echo '{{"type":"thread.started","thread_id":"thread-1"}}'
  echo '{{"type":"response_item","payload":{{"type":"message","role":"assistant","content":[{{"type":"output_text","text":"first answer"}}]}}}}'
  printf '{{"type":"message","text":"follow up"}}' > "{inbox}/001.json.tmp"
  mv "{inbox}/001.json.tmp" "{inbox}/001.json"
else
  echo '{{"type":"assistant.delta","text":"second "}}'
  echo '{{"type":"assistant.delta","text":"answer"}}'
  : > "{inbox}/{CLOSE_SENTINEL}"
fi
echo '{{"type":"turn.completed"}}'
"#
    )
}

fn records(output: OutputChannel<Vec<u8>>) -> Vec<RunnerOutput> {
    let written = String::from_utf8(output.into_inner()).expect("utf8");
    extract_payloads(&written)
        .into_iter()
        .map(|line| serde_json::from_str(line).expect("record"))
        .collect()
}

#[test]
fn follow_up_resumes_session_and_close_ends_run() {
    let mut workspace = TestWorkspace::new().expect("workspace");
    let inbox_dir = workspace.config.ipc_input_dir.clone();
    let script = two_turn_script(workspace.path(), &inbox_dir);
    workspace.install_fake_codex(&script);

    // Left over from a previous run; must not end this one.
    fs::write(inbox_dir.join(CLOSE_SENTINEL), "").expect("stale sentinel");
    fs::write(
        inbox_dir.join("000.json"),
        r#"{"type":"message","text":"queued early"}"#,
    )
    .expect("queued message");

    let config = &workspace.config;
    let input = sample_input("hello");
    let mut mailbox = FsMailbox::new(&config.ipc_input_dir, config.poll_interval());
    mailbox.prepare().expect("prepare");
    let executor = CodexExecutor::new(config, &input, path_env());
    let mut output = OutputChannel::new(Vec::new());

    let outcome =
        run_session(&input, None, &executor, &mut mailbox, &mut output).expect("session");

    assert_eq!(outcome.stop, LoopStop::Closed);
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.session_id.as_deref(), Some("thread-1"));
    assert_eq!(
        records(output),
        vec![
            RunnerOutput::success(Some("first answer".to_string()), Some("thread-1".to_string())),
            RunnerOutput::heartbeat(Some("thread-1".to_string())),
            RunnerOutput::success(Some("second answer".to_string()), Some("thread-1".to_string())),
            RunnerOutput::heartbeat(Some("thread-1".to_string())),
        ]
    );

    let first_args = fs::read_to_string(workspace.path().join("args-1")).expect("args-1");
    assert!(first_args.starts_with("exec\n--json\n"));
    assert!(!first_args.contains("\nresume\n"));
    assert!(first_args.ends_with("hello\nqueued early\n"));

    let second_args = fs::read_to_string(workspace.path().join("args-2")).expect("args-2");
    assert!(second_args.ends_with("resume\nthread-1\nfollow up\n"));

    // Sentinel consumed; mailbox left empty.
    assert_eq!(fs::read_dir(&inbox_dir).expect("inbox").count(), 0);
}

#[test]
fn failing_turn_emits_error_and_stops_without_waiting() {
    let mut workspace = TestWorkspace::new().expect("workspace");
    workspace.install_fake_codex(
        r#"echo '{"type":"thread.started","thread_id":"thread-9"}'
echo '{"type":"error","message":"Reconnecting... 1/5"}'
echo '{"type":"turn.failed","error":{"message":"usage limit reached"}}'
"#,
    );

    let config = &workspace.config;
    let input = sample_input("hello");
    let mut mailbox = FsMailbox::new(&config.ipc_input_dir, config.poll_interval());
    mailbox.prepare().expect("prepare");
    let executor = CodexExecutor::new(config, &input, path_env());
    let mut output = OutputChannel::new(Vec::new());

    let outcome =
        run_session(&input, None, &executor, &mut mailbox, &mut output).expect("session");

    assert_eq!(
        outcome.stop,
        LoopStop::Failed {
            error: "usage limit reached".to_string()
        }
    );
    assert_eq!(
        records(output),
        vec![RunnerOutput::failure("usage limit reached", None)]
    );
}

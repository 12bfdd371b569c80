//! Codex agent runner.
//!
//! Reads one input document from stdin, runs Codex turns until the host writes
//! the close sentinel, and prints each result between output markers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use agent_runner::core::turn_parser::parse_turn_output;
use agent_runner::core::types::RunnerOutput;
use agent_runner::exit_codes;
use agent_runner::io::config::load_config_from;
use agent_runner::io::executor::{CodexExecutor, host_env};
use agent_runner::io::input::{read_input, scrub_input_file};
use agent_runner::io::instructions::load_instruction_context;
use agent_runner::io::mailbox::FsMailbox;
use agent_runner::io::output::OutputChannel;
use agent_runner::logging;
use agent_runner::session::run_session;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "agent-runner",
    version,
    about = "Run Codex turns for one conversation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the input document from stdin and run turns until the mailbox closes.
    Run {
        /// TOML config file (falls back to `AGENT_RUNNER_CONFIG`, then defaults).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse a captured `codex exec --json` transcript and print the turn outcome.
    Parse {
        /// File holding the JSONL output of one turn.
        path: PathBuf,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run { config } => cmd_run(config.as_deref()),
        Command::Parse { path } => match cmd_parse(&path) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{:#}", err);
                exit_codes::FAILED
            }
        },
    };
    std::process::exit(code);
}

fn cmd_run(config_path: Option<&Path>) -> i32 {
    let mut output = OutputChannel::new(std::io::stdout().lock());
    match run_from_stdin(config_path, &mut output) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "runner failed");
            exit_codes::FAILED
        }
    }
}

fn run_from_stdin<W: Write>(
    config_path: Option<&Path>,
    output: &mut OutputChannel<W>,
) -> Result<i32> {
    // Read stdin to EOF before anything else can fail.
    let input = match read_input(std::io::stdin().lock()) {
        Ok(input) => input,
        Err(err) => {
            return report_startup_failure(output, format!("Failed to parse input: {err:#}"));
        }
    };
    let config = match load_config_from(config_path) {
        Ok(config) => config,
        Err(err) => {
            return report_startup_failure(output, format!("Failed to load config: {err:#}"));
        }
    };
    scrub_input_file(config.input_temp_file.as_deref());
    info!(group = %input.group_folder, is_main = input.is_main, "received input");

    let mut mailbox = FsMailbox::new(&config.ipc_input_dir, config.poll_interval());
    if let Err(err) = mailbox.prepare() {
        return report_startup_failure(output, format!("Failed to prepare mailbox: {err:#}"));
    }
    let instructions = load_instruction_context(&config, input.is_main);
    let executor = CodexExecutor::new(&config, &input, host_env());

    let outcome = run_session(
        &input,
        instructions.as_deref(),
        &executor,
        &mut mailbox,
        output,
    )?;
    info!(turns = outcome.turns, stop = ?outcome.stop, "session ended");
    Ok(if outcome.is_success() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

/// Emit a failure record for an error that happened before any turn ran.
fn report_startup_failure<W: Write>(
    output: &mut OutputChannel<W>,
    message: String,
) -> Result<i32> {
    error!(error = %message, "startup failed");
    output.emit(&RunnerOutput::failure(message, None))?;
    Ok(exit_codes::FAILED)
}

fn cmd_parse(path: &Path) -> Result<i32> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed = parse_turn_output(&raw);
    println!(
        "{}",
        serde_json::to_string_pretty(&parsed).context("serialize parsed turn")?
    );
    Ok(if parsed.is_ok() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

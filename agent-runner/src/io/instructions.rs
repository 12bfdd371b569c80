//! Instruction files (`AGENTS.md`, legacy `CLAUDE.md`) for the first prompt.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::prompt::instruction_context;
use crate::io::config::RunnerConfig;

const INSTRUCTION_FILES: [&str; 2] = ["AGENTS.md", "CLAUDE.md"];

/// First non-empty (trimmed) content among `candidates`. Unreadable files are skipped.
pub fn read_first_instruction_file(candidates: &[PathBuf]) -> Option<String> {
    candidates.iter().find_map(|path| {
        let content = fs::read_to_string(path).ok()?;
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        debug!(path = %path.display(), "loaded instruction file");
        Some(content.to_string())
    })
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    INSTRUCTION_FILES.iter().map(|name| dir.join(name)).collect()
}

/// Build the instruction context for a run, if any instruction file has content.
///
/// Group instructions come from the group workspace. Global instructions come
/// from the project checkout for primary sessions and from the global mount
/// otherwise.
pub fn load_instruction_context(config: &RunnerConfig, is_main: bool) -> Option<String> {
    let group = read_first_instruction_file(&candidates_in(&config.group_dir));
    let global_dir = if is_main {
        config.project_dir.join("groups").join("global")
    } else {
        config.global_dir.clone()
    };
    let global = read_first_instruction_file(&candidates_in(&global_dir));
    instruction_context(global.as_deref(), group.as_deref())
}

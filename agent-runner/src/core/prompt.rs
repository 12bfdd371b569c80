//! Composition of the first prompt of a run.

pub const SCHEDULED_TASK_PREFIX: &str = "[SCHEDULED TASK - The following message was sent automatically and is not coming directly from the user or group.]\n\n";

const INSTRUCTION_PREAMBLE: &str =
    "Use the following project instructions as high-priority context:\n\n";

/// Merge global and group instruction text into a single context block.
///
/// Returns `None` when neither source has content.
pub fn instruction_context(global: Option<&str>, group: Option<&str>) -> Option<String> {
    let mut sections = Vec::new();
    if let Some(global) = global {
        sections.push(format!("Global instructions:\n{global}"));
    }
    if let Some(group) = group {
        sections.push(format!("Group instructions:\n{group}"));
    }
    if sections.is_empty() {
        return None;
    }
    Some(format!("{INSTRUCTION_PREAMBLE}{}", sections.join("\n\n")))
}

/// Build the prompt for the first turn.
///
/// Follow-up turns use mailbox text verbatim and never pass through here.
pub fn initial_prompt(
    prompt: &str,
    is_scheduled_task: bool,
    instructions: Option<&str>,
    pending: &[String],
) -> String {
    let mut out = if is_scheduled_task {
        format!("{SCHEDULED_TASK_PREFIX}{prompt}")
    } else {
        prompt.to_string()
    };
    if let Some(context) = instructions {
        out = format!("{context}\n\nUser request:\n{out}");
    }
    if !pending.is_empty() {
        out.push('\n');
        out.push_str(&pending.join("\n"));
    }
    out
}

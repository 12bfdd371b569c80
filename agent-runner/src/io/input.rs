//! Reading the initial input document.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::TurnInput;

/// Read the whole input document from `reader` and parse it.
pub fn read_input<R: Read>(mut reader: R) -> Result<TurnInput> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw).context("read stdin")?;
    serde_json::from_str(&raw).context("parse input json")
}

/// Delete the entrypoint's temp copy of the input, which holds secrets.
///
/// Missing files and deletion errors are ignored.
pub fn scrub_input_file(path: Option<&Path>) {
    if let Some(path) = path
        && fs::remove_file(path).is_ok()
    {
        debug!(path = %path.display(), "removed input temp file");
    }
}

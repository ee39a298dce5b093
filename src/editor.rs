//! `edit <noun> <name>`: fetch, open in `$EDITOR`, update.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::Command;
use tracing::debug;

use crate::error::Error;
use crate::render::to_json_pretty;
use crate::runner::{Request, Response};
use crate::transfer::{decode, Transfer};

const FALLBACK_EDITOR: &str = "vi";

/// Editor command from `$VISUAL` / `$EDITOR`, split on whitespace.
pub fn editor_command() -> Vec<String> {
    let raw = std::env::var("VISUAL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var("EDITOR").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
    raw.split_whitespace().map(str::to_string).collect()
}

/// Writes `text` to a temp file, runs the editor on it and returns the
/// saved bytes. The temp file is removed afterwards.
pub fn edit_text(text: &str, suffix: &str) -> Result<Vec<u8>> {
    let mut file = tempfile::Builder::new()
        .prefix("ipctl-edit-")
        .suffix(suffix)
        .tempfile()
        .context("Failed to create temporary file for editing")?;
    file.write_all(text.as_bytes())?;
    file.flush()?;

    let command = editor_command();
    let (program, args) = command
        .split_first()
        .ok_or_else(|| Error::Validation("no editor configured".into()))?;
    debug!(editor = %program, path = %file.path().display(), "launching editor");
    let status = Command::new(program)
        .args(args)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to launch editor '{}'", program))?;
    if !status.success() {
        return Err(Error::Validation(format!("editor '{}' exited with {}", program, status)).into());
    }

    std::fs::read(file.path()).context("Failed to read edited file")
}

pub async fn run_edit(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let name = req.arg(0, "name")?;
    let client = req.client().await?;
    let original = t.fetch(client, name, &req.options).await?;

    let text = to_json_pretty(&original)?;
    let bytes = edit_text(&text, ".json")?;
    let edited = decode(&bytes, "edited document")?;

    if edited == original {
        return Ok(Response::text(format!("Edit cancelled, no changes made to `{}`", name))
            .with_object(original));
    }

    t.validate(&edited)?;
    let updated = t.update(client, name, edited).await?;
    Ok(Response::text(format!("Successfully updated {} `{}`", t.kind(), name)).with_object(updated))
}

//! Response renderers.
//!
//! | Format | Source | Notes |
//! |--------|--------|-------|
//! | `json` | `Response.object` | 4-space indent; error if no object |
//! | `yaml` | `Response.object` | error if no object |
//! | `human` | `Response.text` | tab-aligned table when `keys` is set; optional pager |
//!
//! Renderers hold no state beyond their settings and are built per
//! invocation. An unknown format is rejected at construction.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str::FromStr;

use crate::error::Error;
use crate::runner::Response;

/// Spaces between aligned table columns.
const COLUMN_PADDING: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
    Yaml,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "human" => Ok(Format::Human),
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            other => Err(Error::Render(format!(
                "unknown output format '{}' (expected human, json or yaml)",
                other
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    format: Format,
    pager: bool,
}

impl Renderer {
    pub fn new(format: &str, pager: bool) -> Result<Self> {
        Ok(Self {
            format: format.parse()?,
            pager,
        })
    }

    /// Renders `resp` on stdout, through the pager for tables when enabled
    /// and stdout is a terminal.
    pub fn render(&self, resp: &Response) -> Result<()> {
        let out = self.render_string(resp)?;
        if self.pager && !resp.keys.is_empty() && atty::is(atty::Stream::Stdout) {
            if page(&out).is_ok() {
                return Ok(());
            }
        }
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(out.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Produces the exact bytes [`render`](Renderer::render) would print.
    pub fn render_string(&self, resp: &Response) -> Result<String> {
        match self.format {
            Format::Json => {
                let object = require_object(resp)?;
                let mut out = to_json_pretty(object)?;
                out.push('\n');
                Ok(out)
            }
            Format::Yaml => {
                let object = require_object(resp)?;
                serde_yaml::to_string(object).context("Failed to encode YAML")
            }
            Format::Human => {
                let text = if !resp.template.is_empty() {
                    apply_template(&resp.template, resp.object.as_ref())
                } else {
                    resp.text.clone()
                };
                if text.is_empty() {
                    return Err(Error::Render("response has no text to display".into()).into());
                }
                let mut out = if resp.keys.is_empty() {
                    text
                } else {
                    align_columns(&text)
                };
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}

fn require_object(resp: &Response) -> Result<&Value> {
    resp.object
        .as_ref()
        .ok_or_else(|| Error::Render("response has no object to encode".into()).into())
}

/// JSON with a 4-space indent, as used for output and exported files.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to encode JSON")?;
    String::from_utf8(buf).context("JSON output was not UTF-8")
}

/// Aligns tab-separated rows into padded columns. The last column is
/// never padded.
pub fn align_columns(text: &str) -> String {
    let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < row.len() {
                let pad = widths[i] - cell.chars().count() + COLUMN_PADDING;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Replaces `{{field}}` with the top-level `field` of `object`.
fn apply_template(template: &str, object: Option<&Value>) -> String {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim().trim_start_matches('.');
        let value = object.and_then(|o| o.get(key));
        match value {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn page(text: &str) -> Result<()> {
    let pager = std::env::var("PAGER").unwrap_or_else(|_| "less -FRX".to_string());
    let mut parts = pager.split_whitespace();
    let program = parts.next().unwrap_or("less");
    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start pager '{}'", program))?;
    if let Some(mut stdin) = child.stdin.take() {
        // The user may quit the pager before reading everything.
        let _ = stdin.write_all(text.as_bytes());
    }
    child.wait()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Renderer::new("xml", false).is_err());
        assert!(Renderer::new("human", true).is_ok());
    }

    #[test]
    fn json_requires_object() {
        let r = Renderer::new("json", false).unwrap();
        assert!(r.render_string(&Response::text("hi")).is_err());

        let out = r
            .render_string(&Response::default().with_object(json!({"name": "x"})))
            .unwrap();
        assert_eq!(out, "{\n    \"name\": \"x\"\n}\n");
    }

    #[test]
    fn yaml_encodes_object() {
        let r = Renderer::new("yaml", false).unwrap();
        let out = r
            .render_string(&Response::default().with_object(json!({"name": "x"})))
            .unwrap();
        assert_eq!(out, "name: x\n");
    }

    #[test]
    fn human_requires_text() {
        let r = Renderer::new("human", false).unwrap();
        assert!(r.render_string(&Response::default()).is_err());
        assert_eq!(r.render_string(&Response::text("done")).unwrap(), "done\n");
    }

    #[test]
    fn human_aligns_tables() {
        let r = Renderer::new("human", false).unwrap();
        let resp = Response::table(
            &["NAME", "DESCRIPTION"],
            vec![
                vec!["alpha".into(), "first".into()],
                vec!["b".into(), "".into()],
            ],
            json!([]),
        );
        let out = r.render_string(&resp).unwrap();
        assert_eq!(out, "NAME    DESCRIPTION\nalpha   first\nb\n");
    }

    #[test]
    fn human_applies_template() {
        let r = Renderer::new("human", false).unwrap();
        let resp = Response {
            object: Some(json!({"name": "X", "count": 3})),
            template: "{{name}} has {{ .count }} items".into(),
            ..Default::default()
        };
        assert_eq!(r.render_string(&resp).unwrap(), "X has 3 items\n");
    }
}

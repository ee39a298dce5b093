//! Minimal INI-flavored reader for the `ipctl` config file.
//!
//! Supports `[section]` and `[section name]` headers, `key = value` (or
//! `key: value`) pairs, full-line `#` / `;` comments, and single- or
//! double-quoted values. Keys are lowercased; values are kept verbatim
//! apart from surrounding whitespace and quotes.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// One `[...]` block of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub values: BTreeMap<String, String>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parsed file: section header (normalized, e.g. `"profile prod"`) to section.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub sections: BTreeMap<String, Section>,
}

impl Document {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Returns `(name, section)` for every `[<kind> <name>]` header.
    pub fn named(&self, kind: &str) -> Vec<(&str, &Section)> {
        let prefix = format!("{} ", kind);
        self.sections
            .iter()
            .filter_map(|(header, section)| {
                header
                    .strip_prefix(&prefix)
                    .map(|name| (name, section))
            })
            .collect()
    }
}

pub fn parse(content: &str) -> Result<Document> {
    let mut doc = Document::default();
    let mut current: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let Some(header) = rest.strip_suffix(']') else {
                bail!("line {}: unterminated section header", lineno);
            };
            let header = normalize_header(header, lineno)?;
            doc.sections.entry(header.clone()).or_default();
            current = Some(header);
            continue;
        }

        let Some(pos) = line.find(['=', ':']) else {
            bail!("line {}: expected 'key = value'", lineno);
        };
        let key = line[..pos].trim().to_lowercase();
        if key.is_empty() {
            bail!("line {}: empty key", lineno);
        }
        let value = unquote(line[pos + 1..].trim());

        let Some(section) = current.as_ref() else {
            bail!("line {}: key '{}' outside of any section", lineno, key);
        };
        if let Some(s) = doc.sections.get_mut(section) {
            s.values.insert(key, value.to_string());
        }
    }

    Ok(doc)
}

/// Lowercases the section kind and rejects entity names containing
/// whitespace (`[profile my prod]`).
fn normalize_header(header: &str, lineno: usize) -> Result<String> {
    let header = header.trim();
    let mut parts = header.splitn(2, char::is_whitespace);
    let kind = parts.next().unwrap_or_default().to_lowercase();
    if kind.is_empty() {
        bail!("line {}: empty section header", lineno);
    }
    match parts.next().map(str::trim) {
        None | Some("") => Ok(kind),
        Some(name) => {
            let name = unquote(name);
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                bail!(
                    "line {}: {} name '{}' must not contain whitespace",
                    lineno,
                    kind,
                    name
                );
            }
            Ok(format!("{} {}", kind, name))
        }
    }
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

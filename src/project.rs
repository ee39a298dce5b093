//! Project codec: member specifications and the expanded on-disk layout.
//!
//! An expanded project is written as a root `<name>.project.json` whose
//! `components[]` entries carry `{ ...metadata, filename }` instead of an
//! inline `document`, plus one `<component>.<type>.json` file per
//! component under the component's `folder` path.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// Fields never carried in an exported project.
pub const STRIPPED_FIELDS: [&str; 2] = ["members", "accessControl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Account,
    Group,
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::Account => "account",
            MemberType::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    Owner,
    #[default]
    Editor,
    Operator,
    Viewer,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Owner => "owner",
            Access::Editor => "editor",
            Access::Operator => "operator",
            Access::Viewer => "viewer",
        }
    }
}

/// One `--member` value: `type=account|group,name=NAME[,access=ROLE]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    pub kind: MemberType,
    pub name: String,
    pub access: Access,
}

impl FromStr for MemberSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |msg: String| -> anyhow::Error {
            Error::Validation(format!("invalid member '{}': {}", s, msg)).into()
        };

        let mut seen = BTreeSet::new();
        let mut kind = None;
        let mut name = None;
        let mut access = None;

        for pair in s.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected key=value, got '{}'", pair)))?;
            let key = key.trim();
            let value = value.trim();
            if !seen.insert(key.to_string()) {
                return Err(invalid(format!("duplicate key '{}'", key)));
            }
            if value.is_empty() {
                return Err(invalid(format!("empty value for '{}'", key)));
            }
            match key {
                "type" => {
                    kind = Some(match value {
                        "account" => MemberType::Account,
                        "group" => MemberType::Group,
                        other => return Err(invalid(format!("invalid type '{}'", other))),
                    })
                }
                "name" => name = Some(value.to_string()),
                "access" => {
                    access = Some(match value {
                        "owner" => Access::Owner,
                        "editor" => Access::Editor,
                        "operator" => Access::Operator,
                        "viewer" => Access::Viewer,
                        other => return Err(invalid(format!("invalid access '{}'", other))),
                    })
                }
                other => return Err(invalid(format!("unknown key '{}'", other))),
            }
        }

        Ok(MemberSpec {
            kind: kind.ok_or_else(|| invalid("missing type".into()))?,
            name: name.ok_or_else(|| invalid("missing name".into()))?,
            access: access.unwrap_or_default(),
        })
    }
}

impl fmt::Display for MemberSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={},name={},access={}",
            self.kind.as_str(),
            self.name,
            self.access.as_str()
        )
    }
}

/// Drops `members` and `accessControl` from a project document.
pub fn strip(project: &mut Value) {
    if let Some(map) = project.as_object_mut() {
        for field in STRIPPED_FIELDS {
            map.remove(field);
        }
    }
}

/// Name a component's file is stored under.
fn component_name(component: &Map<String, Value>) -> Option<&str> {
    component
        .get("document")
        .and_then(|d| d.get("name"))
        .or_else(|| component.get("name"))
        .and_then(Value::as_str)
}

/// Folder path of a component relative to the project root, with a single
/// leading `/` removed.
pub fn normalize_folder(folder: &str) -> &str {
    folder.strip_prefix('/').unwrap_or(folder)
}

/// Relative path of a component file. Folders and filenames that would
/// leave the project directory are rejected.
fn component_path(folder: &str, filename: &str) -> Result<PathBuf> {
    let path = Path::new(normalize_folder(folder)).join(filename);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || Path::new(filename).components().count() != 1 {
        return Err(Error::Validation(format!(
            "project component path '{}' escapes the project directory",
            path.display()
        ))
        .into());
    }
    Ok(path)
}

fn component_filename(component: &Map<String, Value>) -> Result<String> {
    let name = component_name(component).ok_or_else(|| {
        Error::Validation("project component has no document name".into())
    })?;
    let kind = component
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation(format!("project component '{}' has no type", name)))?;
    Ok(format!(
        "{}.{}.json",
        name.replace('/', "_"),
        kind.to_lowercase()
    ))
}

/// Splits a project into its root document and one file per component.
///
/// Returned paths are relative to the export directory. The root document is
/// always first.
pub fn expand(project: &Value, root_filename: &str) -> Result<Vec<(PathBuf, Value)>> {
    let mut root = project.clone();
    strip(&mut root);

    let mut files = Vec::new();
    if let Some(components) = root.get_mut("components").and_then(Value::as_array_mut) {
        for component in components.iter_mut() {
            let Some(map) = component.as_object_mut() else {
                continue;
            };
            let filename = component_filename(map)?;
            let folder = map.get("folder").and_then(Value::as_str).unwrap_or("");
            let path = component_path(folder, &filename)?;
            let document = map.remove("document").unwrap_or(Value::Null);
            map.insert("filename".into(), Value::String(filename));
            files.push((path, document));
        }
    }

    let mut out = vec![(PathBuf::from(root_filename), root)];
    out.extend(files);
    Ok(out)
}

/// Reassembles an expanded project read from `basepath`.
pub fn collapse(root: Value, basepath: &Path) -> Result<Value> {
    let mut root = root;
    if let Some(components) = root.get_mut("components").and_then(Value::as_array_mut) {
        for component in components.iter_mut() {
            let Some(map) = component.as_object_mut() else {
                continue;
            };
            let Some(filename) = map.remove("filename") else {
                continue;
            };
            let filename = filename.as_str().ok_or_else(|| {
                Error::Validation("project component filename must be a string".into())
            })?;
            let folder = map.get("folder").and_then(Value::as_str).unwrap_or("");
            let path = basepath.join(component_path(folder, filename)?);
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read component file: {}", path.display()))?;
            let document = crate::transfer::decode(&bytes, &path.display().to_string())?;
            map.insert("document".into(), document);
        }
    }
    Ok(root)
}

/// Whether a project document is in expanded form.
pub fn is_expanded(project: &Value) -> bool {
    project
        .get("components")
        .and_then(Value::as_array)
        .is_some_and(|c| c.iter().any(|x| x.get("filename").is_some()))
}

/// Request bodies for adding `members`, skipping the user the client is
/// logged in as.
pub fn member_bodies(members: &[MemberSpec], active_user: &str) -> Vec<Value> {
    members
        .iter()
        .filter(|m| !(m.kind == MemberType::Account && m.name == active_user))
        .map(|m| {
            serde_json::json!({
                "type": m.kind.as_str(),
                "name": m.name,
                "role": m.access.as_str(),
            })
        })
        .collect()
}

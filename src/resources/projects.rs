//! Project-specific hooks for the asset runner: membership is never
//! exported, `--expand` splits components into their own files, and
//! `--member` adds members after import or copy.

use anyhow::Result;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::client::Client;
use crate::flags::{HandlerFlags, Options, ProjectFlags};
use crate::project::{self, member_bodies};
use crate::runner::Verb;
use crate::transfer::{export_filename, read_document};

pub fn flags(flags: HandlerFlags) -> HandlerFlags {
    let members = || ProjectFlags {
        members: true,
        expand: false,
    };
    let expand = || ProjectFlags {
        members: false,
        expand: true,
    };
    flags
        .with(Verb::Import, members())
        .with(Verb::Copy, members())
        .with(Verb::Pull, members())
        .with(Verb::Load, members())
        .with(Verb::Export, expand())
        .with(Verb::Push, expand())
        .with(Verb::Dump, expand())
}

/// Exported form of a project as returned by the server.
pub fn exported(mut doc: Value) -> Value {
    project::strip(&mut doc);
    doc
}

pub fn encode(doc: &Value, name: &str, options: &Options) -> Result<Vec<(PathBuf, Value)>> {
    let filename = export_filename(name, "project");
    if options.expand() {
        return project::expand(doc, &filename);
    }
    Ok(vec![(PathBuf::from(filename), exported(doc.clone()))])
}

/// Reads a project file, reattaching component documents when it was
/// written in expanded form.
pub fn decode_path(path: &Path) -> Result<Value> {
    let root = read_document(path)?;
    if !project::is_expanded(&root) {
        return Ok(root);
    }
    let basepath = path.parent().unwrap_or(Path::new("."));
    project::collapse(root, basepath)
}

/// Whether any `--member` was given.
pub fn has_members(options: &Options) -> bool {
    options.project().is_some_and(|p| !p.members.is_empty())
}

/// Adds the `--member` specifications to the project at `item`.
pub async fn attach_members(client: &Client, item: &str, created: &Value, options: &Options) -> Result<()> {
    let Some(opts) = options.project() else {
        return Ok(());
    };
    let bodies = member_bodies(&opts.members, &client.profile().username);
    if bodies.is_empty() {
        return Ok(());
    }

    let mut members = created
        .get("members")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let count = bodies.len();
    members.extend(bodies);
    client.patch(item, &json!({ "members": members })).await?;
    info!(project = %item, count, "members added");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::ProjectOptions;

    #[test]
    fn unexpanded_export_drops_membership() {
        let doc = json!({"name": "Acme", "members": [], "accessControl": {}, "components": []});
        let files = encode(&doc, "Acme", &Options::None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, PathBuf::from("Acme.project.json"));
        assert_eq!(files[0].1, json!({"name": "Acme", "components": []}));
    }

    #[test]
    fn expanded_export_writes_components() {
        let doc = json!({
            "name": "Acme",
            "components": [{"type": "workflow", "folder": "/", "document": {"name": "W"}}]
        });
        let opts = Options::Project(ProjectOptions {
            members: vec![],
            expand: true,
        });
        let files = encode(&doc, "Acme", &opts).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].0, PathBuf::from("W.workflow.json"));
    }

    #[test]
    fn decode_path_collapses_expanded_projects() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("flows")).unwrap();
        std::fs::write(
            dir.path().join("Acme.project.json"),
            r#"{"name":"Acme","components":[{"type":"workflow","folder":"/flows","filename":"W.workflow.json"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("flows/W.workflow.json"), "name: W\n").unwrap();

        let doc = decode_path(&dir.path().join("Acme.project.json")).unwrap();
        assert_eq!(doc["components"][0]["document"], json!({"name": "W"}));
        assert!(doc["components"][0].get("filename").is_none());
    }
}

//! Push, pull and repository-backed import/export against local bare
//! repositories.

mod common;

use common::{assert_ok, bare_remote, commit_count, show, stderr, stdout, Env, MockServer};
use serde_json::{json, Value};
use tempfile::TempDir;

const ROLES: &str = "/authorization/roles";
const WORKFLOWS: &str = "/automation-studio/workflows";

#[test]
fn test_push_commits_once() {
    let server = MockServer::start();
    server.seed(ROLES, vec![json!({"name": "Operator", "methods": ["get"]})]);
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);
    let url = bare.to_str().unwrap();

    let output = env.run(&["push", "role", "Operator", url, "-m", "add operator role"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("pushed"));
    let content = show(&bare, "Operator.role.json").unwrap();
    let doc: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(doc["methods"], json!(["get"]));
    assert_eq!(commit_count(&bare), 2);

    let output = env.run(&["push", "role", "Operator", url]);
    assert_ok(&output);
    assert!(stdout(&output).contains("already up to date"));
    assert_eq!(commit_count(&bare), 2);
}

#[test]
fn test_push_to_named_repository_and_path() {
    let server = MockServer::start();
    server.seed(ROLES, vec![json!({"name": "Viewer"})]);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);
    let env = Env::with_profiles(
        &[("default", server.port)],
        &format!(
            "[repository assets]\nurl = {}\nname = Release Bot\nemail = bot@example.com\n",
            bare.display()
        ),
    );

    let output = env.run(&["push", "role", "Viewer", "@assets", "--path", "roles"]);
    assert_ok(&output);
    assert!(show(&bare, "roles/Viewer.role.json").is_some());

    let log = std::process::Command::new("git")
        .args(["log", "-1", "--format=%an <%ae>", "main"])
        .current_dir(&bare)
        .output()
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&log.stdout).trim(),
        "Release Bot <bot@example.com>"
    );
}

#[test]
fn test_push_unknown_named_repository() {
    let server = MockServer::start();
    server.seed(ROLES, vec![json!({"name": "Viewer"})]);
    let env = Env::new(&server);
    let output = env.run(&["push", "role", "Viewer", "@missing"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("repository 'missing' does not exist"));
}

#[test]
fn test_pull_imports_from_repository() {
    let server = MockServer::start();
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(
        root.path(),
        &[("roles/Admin.role.json", r#"{"name": "Admin", "methods": ["*"]}"#)],
    );
    let url = bare.to_str().unwrap();

    let output = env.run(&["pull", "role", url, "roles/Admin.role.json"]);
    assert_ok(&output);
    assert!(stdout(&output).contains("Successfully imported role `Admin`"));
    assert_eq!(server.names(ROLES), vec!["Admin"]);

    let output = env.run(&["pull", "role", url, "roles/Admin.role.json"]);
    assert!(!output.status.success());
    let output = env.run(&["pull", "role", url, "roles/Admin.role.json", "--replace"]);
    assert_ok(&output);
    assert_eq!(server.names(ROLES), vec!["Admin"]);
}

#[test]
fn test_pull_missing_file() {
    let server = MockServer::start();
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);

    let output = env.run(&["pull", "role", bare.to_str().unwrap(), "nope.role.json"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("path does not exist"));
    assert!(server.names(ROLES).is_empty());
}

#[test]
fn test_pull_escaping_path_is_rejected() {
    let server = MockServer::start();
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);

    let output = env.run(&["pull", "role", bare.to_str().unwrap(), "../../etc/passwd"]);
    assert!(!output.status.success());
    assert!(server.names(ROLES).is_empty());
}

#[test]
fn test_pull_bad_reference() {
    let server = MockServer::start();
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[("R.role.json", r#"{"name": "R"}"#)]);

    let output = env.run(&[
        "pull",
        "role",
        bare.to_str().unwrap(),
        "R.role.json",
        "--reference",
        "no-such-branch",
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("git clone failed"));
}

#[test]
fn test_export_and_import_through_repository() {
    let server = MockServer::start();
    server.seed(WORKFLOWS, vec![json!({"name": "Nightly", "tasks": {}})]);
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);
    let url = bare.to_str().unwrap();

    let output = env.run(&[
        "export", "workflow", "Nightly", "--repository", url, "--path", "flows",
    ]);
    assert_ok(&output);
    assert!(show(&bare, "flows/Nightly.workflow.json").is_some());

    let target = MockServer::start();
    let env2 = Env::new(&target);
    let output = env2.run(&[
        "import",
        "workflow",
        "flows/Nightly.workflow.json",
        "--repository",
        url,
    ]);
    assert_ok(&output);
    assert_eq!(target.names(WORKFLOWS), vec!["Nightly"]);
}

#[test]
fn test_expanded_project_round_trip_through_repository() {
    let server = MockServer::start();
    server.seed(
        "/automation-studio/projects",
        vec![json!({
            "name": "Acme",
            "members": [{"type": "account", "name": "admin", "role": "owner"}],
            "components": [
                {"type": "workflow", "folder": "/flows", "document": {"name": "Deploy"}}
            ]
        })],
    );
    let env = Env::new(&server);
    let root = TempDir::new().unwrap();
    let bare = bare_remote(root.path(), &[]);
    let url = bare.to_str().unwrap();

    let output = env.run(&["push", "project", "Acme", url, "--expand", "--path", "acme"]);
    assert_ok(&output);
    assert!(show(&bare, "acme/Acme.project.json").is_some());
    assert!(show(&bare, "acme/flows/Deploy.workflow.json").is_some());

    let target = MockServer::start();
    let env2 = Env::new(&target);
    let output = env2.run(&["pull", "project", url, "acme/Acme.project.json"]);
    assert_ok(&output);
    let project = target.items("/automation-studio/projects").remove(0);
    assert_eq!(project["components"][0]["document"]["name"], "Deploy");
    assert!(project.get("members").is_none());
}

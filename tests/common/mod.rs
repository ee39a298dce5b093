//! Shared helpers for the binary-driven tests: an in-process mock server,
//! a throwaway configuration file, and bare Git remotes.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn ipctl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ipctl");
    path
}

const ID_FIELDS: [&str; 5] = ["_id", "id", "versionId", "name", "username"];

#[derive(Default)]
pub struct Store {
    pub collections: BTreeMap<String, Vec<Value>>,
    pub requests: Vec<(String, String)>,
    /// Collections whose POST answers with an empty body.
    pub silent_creates: BTreeSet<String>,
    next_id: u64,
}

impl Store {
    fn find(&mut self, collection: &str, id: &str) -> Option<&mut Value> {
        self.collections.get_mut(collection)?.iter_mut().find(|item| {
            ID_FIELDS
                .iter()
                .any(|f| item.get(*f).and_then(Value::as_str) == Some(id))
        })
    }
}

/// Generic collection server. Collections are keyed by path; items live at
/// `<collection>/<id>` and match on any of the usual id fields.
#[derive(Clone)]
pub struct MockServer {
    pub port: u16,
    pub store: Arc<Mutex<Store>>,
}

impl MockServer {
    pub fn start() -> Self {
        let store = Arc::new(Mutex::new(Store::default()));
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let state = Arc::clone(&store);
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new()
                    .route("/login", post(login))
                    .fallback(handle)
                    .with_state(state);
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { port, store }
    }

    pub fn seed(&self, collection: &str, items: Vec<Value>) {
        let mut store = self.store.lock().unwrap();
        let mut items = items;
        for item in items.iter_mut() {
            if item.get("_id").is_none() {
                store.next_id += 1;
                let id = format!("seed-{}", store.next_id);
                item.as_object_mut().unwrap().insert("_id".into(), json!(id));
            }
        }
        store
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(items);
    }

    pub fn silent_creates(&self, collection: &str) {
        self.store
            .lock()
            .unwrap()
            .silent_creates
            .insert(collection.to_string());
    }

    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.store
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn names(&self, collection: &str) -> Vec<String> {
        self.items(collection)
            .iter()
            .filter_map(|i| i.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Requests other than the login, as `METHOD path`.
    pub fn requests(&self) -> Vec<String> {
        self.store
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(m, p)| format!("{} {}", m, p))
            .collect()
    }
}

async fn login() -> Json<Value> {
    Json(json!("test-token"))
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("{} not found", path) })),
    )
        .into_response()
}

fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

async fn handle(
    State(store): State<Arc<Mutex<Store>>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_end_matches('/').to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut store = store.lock().unwrap();
    store.requests.push((method.to_string(), path.clone()));

    let (parent, last) = split(&path);
    let (parent, last) = (parent.to_string(), last.to_string());

    match method.as_str() {
        "GET" if last == "health" => {
            let (collection, id) = split(&parent);
            match store.find(collection, id) {
                Some(item) => Json(json!({
                    "state": item.get("state").cloned().unwrap_or(json!("STOPPED")),
                    "connection": { "state": "ONLINE" },
                }))
                .into_response(),
                None => not_found(&path),
            }
        }
        "GET" => {
            if let Some(items) = store.collections.get(&path) {
                return Json(json!({ "results": items, "total": items.len() })).into_response();
            }
            if let Some(item) = store.find(&parent, &last) {
                return Json(item.clone()).into_response();
            }
            Json(json!({ "results": [], "total": 0 })).into_response()
        }
        "POST" => {
            let mut item = body;
            store.next_id += 1;
            let id = format!("id-{}", store.next_id);
            if let Some(map) = item.as_object_mut() {
                map.entry("_id").or_insert(json!(id));
            }
            let silent = store.silent_creates.contains(&path);
            store
                .collections
                .entry(path)
                .or_default()
                .push(item.clone());
            if silent {
                return StatusCode::NO_CONTENT.into_response();
            }
            (StatusCode::CREATED, Json(item)).into_response()
        }
        "PUT" if matches!(last.as_str(), "start" | "stop" | "restart") => {
            let (collection, id) = split(&parent);
            let state = if last == "stop" { "STOPPED" } else { "RUNNING" };
            match store.find(collection, id) {
                Some(item) => {
                    item["state"] = json!(state);
                    Json(json!({ "status": "OK" })).into_response()
                }
                None => not_found(&path),
            }
        }
        "PUT" | "PATCH" => match store.find(&parent, &last) {
            Some(item) => {
                let keep = item.get("_id").cloned();
                match (method.as_str(), body) {
                    ("PATCH", Value::Object(patch)) => {
                        if let Some(map) = item.as_object_mut() {
                            map.extend(patch);
                        }
                    }
                    (_, Value::Object(doc)) => {
                        let mut doc: Map<String, Value> = doc;
                        if let Some(id) = keep {
                            doc.insert("_id".into(), id);
                        }
                        *item = Value::Object(doc);
                    }
                    _ => {}
                }
                Json(item.clone()).into_response()
            }
            None => not_found(&path),
        },
        "DELETE" => {
            let exists = store.find(&parent, &last).is_some();
            if !exists {
                return not_found(&path);
            }
            if let Some(items) = store.collections.get_mut(&parent) {
                items.retain(|item| {
                    !ID_FIELDS
                        .iter()
                        .any(|f| item.get(*f).and_then(Value::as_str) == Some(last.as_str()))
                });
            }
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Temporary home with a config file pointing the `default` profile (and a
/// second `other` profile) at mock servers.
pub struct Env {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl Env {
    pub fn new(server: &MockServer) -> Self {
        Self::with_profiles(&[("default", server.port)], "")
    }

    pub fn with_profiles(profiles: &[(&str, u16)], extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let mut content = format!(
            "[application]\nworking_dir = {}\n\n",
            dir.path().join("work").display()
        );
        for (name, port) in profiles {
            content.push_str(&format!(
                "[profile {}]\nhost = 127.0.0.1\nport = {}\nuse_tls = false\ntimeout = 10\n\n",
                name, port
            ));
        }
        content.push_str(extra);
        let config = dir.path().join("config");
        std::fs::write(&config, content).unwrap();
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(ipctl_binary())
            .args(args)
            .current_dir(self.dir.path())
            .env("IPCTL_CONFIG", &self.config)
            .env("HOME", self.dir.path())
            .env_remove("IPCTL_PROFILE")
            .env_remove("RUST_LOG")
            .env("GIT_AUTHOR_NAME", "tester")
            .env("GIT_AUTHOR_EMAIL", "tester@example.com")
            .env("GIT_COMMITTER_NAME", "tester")
            .env("GIT_COMMITTER_EMAIL", "tester@example.com")
            .output()
            .expect("Failed to run ipctl")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "ipctl failed\nstdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "seed")
        .env("GIT_AUTHOR_EMAIL", "seed@example.com")
        .env("GIT_COMMITTER_NAME", "seed")
        .env("GIT_COMMITTER_EMAIL", "seed@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Bare repository with one commit on `main`, seeded with `files`.
pub fn bare_remote(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let bare = root.join("remote.git");
    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    git(root, &["init", "--bare", "--initial-branch=main", "remote.git"]);
    git(&seed, &["init", "--initial-branch=main"]);
    std::fs::write(seed.join("README"), "seed\n").unwrap();
    for (name, content) in files {
        let path = seed.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    git(&seed, &["add", "--all"]);
    git(&seed, &["commit", "-m", "seed"]);
    git(&seed, &["push", bare.to_str().unwrap(), "main"]);
    bare
}

/// Contents of `path` at the tip of `main` in a bare repository.
pub fn show(bare: &Path, path: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["show", &format!("main:{}", path)])
        .current_dir(bare)
        .output()
        .unwrap();
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).to_string())
}

pub fn commit_count(bare: &Path) -> usize {
    let output = Command::new("git")
        .args(["rev-list", "--count", "main"])
        .current_dir(bare)
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().parse().unwrap()
}

//! Import / export pipeline shared by every transferable resource.
//!
//! A runner implements [`Transfer`] (fetch, name, validate, remove, load)
//! and delegates its `import`, `export`, `push`, `pull`, `dump` and `load`
//! verbs to the `run_*` functions here. The pipeline treats a local
//! directory and a Git checkout as interchangeable: with `--repository`
//! the same steps run against a temporary clone that is removed on every
//! exit path.
//!
//! Files are `<name>.<kind>.json`, 4-space indented. Reading falls back
//! from JSON to YAML.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::client::Client;
use crate::config::{expand_tilde, Repository};
use crate::error::{is_not_found, Error};
use crate::flags::{self, Common, Options};
use crate::git::{Checkout, DEFAULT_COMMIT_MESSAGE};
use crate::render::to_json_pretty;
use crate::runner::{Request, Response};

/// Server-side operations the pipeline needs from a resource type.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Singular type tag used in filenames, e.g. `"workflow"`.
    fn kind(&self) -> &str;

    /// Reads `name` from the server in its exported form.
    async fn fetch(&self, client: &Client, name: &str, options: &Options) -> Result<Value>;

    /// Whether a resource called `name` exists.
    async fn exists(&self, client: &Client, name: &str) -> Result<bool>;

    /// Deletes `name`. A missing resource is reported as not-found.
    async fn remove(&self, client: &Client, name: &str) -> Result<()>;

    /// Creates the resource described by `doc` and returns the server's view.
    async fn load(&self, client: &Client, doc: Value, options: &Options) -> Result<Value>;

    /// Names of every resource of this type, in server order.
    async fn list_names(&self, client: &Client) -> Result<Vec<String>>;

    /// Replaces `name` with `doc` in place.
    async fn update(&self, _client: &Client, name: &str, _doc: Value) -> Result<Value> {
        Err(Error::NotImplemented {
            verb: "update".into(),
            resource: format!("{} '{}'", self.kind(), name),
        }
        .into())
    }

    fn name_of(&self, doc: &Value) -> Result<String> {
        doc.get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Validation(format!("{} document is missing 'name'", self.kind())).into()
            })
    }

    fn validate(&self, doc: &Value) -> Result<()> {
        if !doc.is_object() {
            return Err(
                Error::Validation(format!("{} document must be an object", self.kind())).into(),
            );
        }
        self.name_of(doc).map(|_| ())
    }

    /// Files to write for `doc`, relative to the export directory.
    fn encode(&self, doc: &Value, name: &str, _options: &Options) -> Result<Vec<(PathBuf, Value)>> {
        Ok(vec![(
            PathBuf::from(export_filename(name, self.kind())),
            doc.clone(),
        )])
    }

    /// Reads a document previously written by [`encode`](Transfer::encode).
    fn decode_path(&self, path: &Path, _options: &Options) -> Result<Value> {
        read_document(path)
    }

    /// Follow-up after a successful import or copy.
    async fn after_import(&self, _client: &Client, _created: &Value, _options: &Options) -> Result<()> {
        Ok(())
    }
}

/// `<name>.<kind>.json`, with `/` in the name replaced by `_`.
pub fn export_filename(name: &str, kind: &str) -> String {
    format!("{}.{}.json", name.replace('/', "_"), kind)
}

/// Decodes `bytes` as JSON, falling back to YAML.
pub fn decode(bytes: &[u8], source: &str) -> Result<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Ok(value),
        Err(json_err) => {
            debug!(source, error = %json_err, "not JSON, trying YAML");
            serde_yaml::from_slice::<Value>(bytes).map_err(|_| Error::Decode(source.to_string()).into())
        }
    }
}

pub fn read_document(path: &Path) -> Result<Value> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    decode(&bytes, &path.display().to_string())
}

/// Absolute form of a user-supplied path, which must exist.
pub fn existing_path(arg: &str) -> Result<PathBuf> {
    let path = expand_tilde(Path::new(arg));
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    if !path.exists() {
        return Err(Error::Validation(format!("path does not exist: {}", path.display())).into());
    }
    Ok(path)
}

/// Writes `files` under `dir`, creating folders as needed. Returns the
/// written paths.
pub fn write_files(dir: &Path, files: &[(PathBuf, Value)]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (relative, value) in files {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let mut text = to_json_pretty(value)?;
        text.push('\n');
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "wrote");
        written.push(path);
    }
    Ok(written)
}

/// Validates `doc` and creates it, honouring `replace` when a resource with
/// the same name already exists.
pub async fn import_document(
    t: &dyn Transfer,
    client: &Client,
    doc: Value,
    replace: bool,
    options: &Options,
) -> Result<Value> {
    t.validate(&doc)?;
    let name = t.name_of(&doc)?;

    if replace {
        match t.remove(client, &name).await {
            Ok(()) => debug!(kind = t.kind(), name = %name, "removed for replace"),
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e),
        }
    } else if t.exists(client, &name).await? {
        return Err(Error::AlreadyExists(format!(
            "{} '{}' already exists, use --replace",
            t.kind(),
            name
        ))
        .into());
    }

    let created = t.load(client, doc, options).await?;
    t.after_import(client, &created, options).await?;
    info!(kind = t.kind(), name = %name, "imported");
    Ok(created)
}

fn imported(t: &dyn Transfer, created: Value, fallback: &str) -> Response {
    let name = t.name_of(&created).unwrap_or_else(|_| fallback.to_string());
    Response::text(format!("Successfully imported {} `{}`", t.kind(), name)).with_object(created)
}

pub async fn run_import(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let arg = req.arg(0, "path")?;
    let Common::Import(common) = &req.common else {
        return Err(Error::Validation("import flags missing".into()).into());
    };

    let repo = common.git.resolve(&req.runtime.config)?;
    let doc = match repo {
        Some(repo) => {
            let checkout = Checkout::clone(&repo)?;
            let path = checkout.join(Path::new(arg))?;
            if !path.exists() {
                return Err(Error::Validation(format!("path does not exist: {}", arg)).into());
            }
            t.decode_path(&path, &req.options)?
        }
        None => t.decode_path(&existing_path(arg)?, &req.options)?,
    };

    let client = req.client().await?;
    let created = import_document(t, client, doc, common.replace, &req.options).await?;
    Ok(imported(t, created, arg))
}

/// Writes `files` into a fresh clone of `repo` under `subdir` and pushes.
fn publish(
    req: &Request,
    repo: &Repository,
    subdir: Option<&Path>,
    files: &[(PathBuf, Value)],
    message: Option<&str>,
) -> Result<(bool, Vec<PathBuf>)> {
    let checkout = Checkout::clone(repo)?;
    let dir = checkout.join(subdir.unwrap_or(Path::new("")))?;
    let written = write_files(&dir, files)?;
    let relative = written
        .iter()
        .map(|p| p.strip_prefix(checkout.path()).unwrap_or(p).to_path_buf())
        .collect();
    let (name, email) = req.runtime.config.commit_identity(repo);
    let pushed = checkout.commit_and_push(message.unwrap_or(DEFAULT_COMMIT_MESSAGE), (&name, &email))?;
    Ok((pushed, relative))
}

fn exported(t: &dyn Transfer, name: &str, written: &[PathBuf], doc: Value) -> Response {
    let target = written
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Response::text(format!("Successfully exported {} `{}` to {}", t.kind(), name, target))
        .with_object(doc)
}

pub async fn run_export(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let name = req.arg(0, "name")?;
    let Common::Export(common) = &req.common else {
        return Err(Error::Validation("export flags missing".into()).into());
    };
    let repo = common.git.resolve(&req.runtime.config)?;

    let client = req.client().await?;
    let doc = t.fetch(client, name, &req.options).await?;
    let files = t.encode(&doc, name, &req.options)?;

    match repo {
        Some(repo) => {
            let (_, written) = publish(
                req,
                &repo,
                common.path.as_deref(),
                &files,
                common.message.as_deref(),
            )?;
            Ok(exported(t, name, &written, doc))
        }
        None => {
            let dir = match &common.path {
                Some(p) => expand_tilde(p),
                None => std::env::current_dir()?,
            };
            let written = write_files(&dir, &files)?;
            Ok(exported(t, name, &written, doc))
        }
    }
}

pub async fn run_push(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let name = req.arg(0, "name")?;
    let token = req.arg(1, "repository")?;
    let Common::Push(common) = &req.common else {
        return Err(Error::Validation("push flags missing".into()).into());
    };
    let repo = flags::resolve_repository(
        &req.runtime.config,
        token,
        common.reference.as_deref(),
        common.private_key_file.as_ref(),
    )?;

    let client = req.client().await?;
    let doc = t.fetch(client, name, &req.options).await?;
    let files = t.encode(&doc, name, &req.options)?;
    let (pushed, written) = publish(
        req,
        &repo,
        common.path.as_deref(),
        &files,
        common.message.as_deref(),
    )?;

    let verb = if pushed { "pushed" } else { "already up to date in" };
    Ok(Response::text(format!(
        "{} `{}` {} {}",
        t.kind(),
        name,
        verb,
        repo.url
    ))
    .with_object(serde_json::json!({
        "name": name,
        "repository": repo.url,
        "reference": repo.reference,
        "files": written,
        "pushed": pushed,
    })))
}

pub async fn run_pull(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let token = req.arg(0, "repository")?;
    let filename = req.arg(1, "filename")?;
    let Common::Pull(common) = &req.common else {
        return Err(Error::Validation("pull flags missing".into()).into());
    };
    let repo = flags::resolve_repository(
        &req.runtime.config,
        token,
        common.reference.as_deref(),
        common.private_key_file.as_ref(),
    )?;

    let doc = {
        let checkout = Checkout::clone(&repo)?;
        let path = checkout.join(Path::new(filename))?;
        if !path.exists() {
            return Err(Error::Validation(format!(
                "path does not exist: {} in {}",
                filename, repo.url
            ))
            .into());
        }
        t.decode_path(&path, &req.options)?
    };

    let client = req.client().await?;
    let created = import_document(t, client, doc, common.replace, &req.options).await?;
    Ok(imported(t, created, filename))
}

pub async fn run_dump(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let dir = match &req.common {
        Common::Dump(c) => c.path.as_deref().map(expand_tilde),
        _ => None,
    };
    let dir = match dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };

    let client = req.client().await?;
    let names = t.list_names(client).await?;
    let mut rows = Vec::with_capacity(names.len());
    let mut paths = Vec::with_capacity(names.len());
    for name in &names {
        let doc = t.fetch(client, name, &req.options).await?;
        let files = t.encode(&doc, name, &req.options)?;
        let written = write_files(&dir, &files)?;
        if let Some(first) = written.first() {
            rows.push(vec![name.clone(), first.display().to_string()]);
            paths.push(Value::String(first.display().to_string()));
        }
    }
    info!(kind = t.kind(), count = names.len(), dir = %dir.display(), "dumped");

    if rows.is_empty() {
        return Ok(Response::text(format!("No {} resources to dump", t.kind()))
            .with_object(Value::Array(paths)));
    }
    Ok(Response::table(&["NAME", "FILE"], rows, Value::Array(paths)))
}

/// Files in `dir` named `*.<kind>.json`, sorted by name.
pub fn collect_files(dir: &Path, kind: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{}.json", kind);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub async fn run_load(t: &dyn Transfer, req: &Request) -> Result<Response> {
    let dir = existing_path(req.arg(0, "directory")?)?;
    let replace = req.common.replace();
    let files = collect_files(&dir, t.kind())?;

    let client = req.client().await?;
    let mut rows = Vec::with_capacity(files.len());
    let mut created = Vec::with_capacity(files.len());
    for path in &files {
        let doc = t.decode_path(path, &req.options)?;
        let value = import_document(t, client, doc, replace, &req.options)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let name = t.name_of(&value).unwrap_or_default();
        rows.push(vec![name, path.display().to_string()]);
        created.push(value);
    }

    if rows.is_empty() {
        return Ok(Response::text(format!(
            "No {} files found in {}",
            t.kind(),
            dir.display()
        ))
        .with_object(Value::Array(created)));
    }
    Ok(Response::table(&["NAME", "FILE"], rows, Value::Array(created)))
}

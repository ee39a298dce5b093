//! Generic runner for server-side resources.
//!
//! One [`AssetRunner`] is registered per [`AssetKind`]. It implements every
//! capability trait, and declares the subset enabled by the kind's
//! [`Caps`](super::kinds::Caps). Items are located by listing the
//! collection and matching on the kind's name field, then addressed by id
//! at `<list>/<id>`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::kinds::{AssetKind, Codec};
use super::projects;
use crate::client::Client;
use crate::copy::{self, CopyRequest};
use crate::editor;
use crate::error::{is_not_found, Error};
use crate::flags::{CreateFlags, HandlerFlags, ListFlags, Options};
use crate::runner::{
    Controller, Copier, Dumper, Editor, Exporter, Gitter, Importer, Inspector, Reader, Request,
    Response, Runner, Verb, Writer,
};
use crate::transfer::{self, Transfer};

/// Fields assigned by the server that are dropped before create or update.
const SERVER_FIELDS: [&str; 5] = ["_id", "created", "createdBy", "lastUpdated", "lastUpdatedBy"];

/// Envelope keys a collection response may nest its items under.
const LIST_KEYS: [&str; 4] = ["results", "data", "list", "items"];

pub struct AssetRunner {
    kind: &'static AssetKind,
}

impl AssetRunner {
    pub fn new(kind: &'static AssetKind) -> Self {
        Self { kind }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.kind.list, id)
    }

    fn item_name<'v>(&self, item: &'v Value) -> Option<&'v str> {
        item.get(self.kind.name_field).and_then(Value::as_str)
    }

    fn id_of(&self, item: &Value) -> Result<String> {
        match item.get(self.kind.id_field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(Error::Validation(format!(
                "{} has no '{}' field",
                self.kind.kind, self.kind.id_field
            ))
            .into()),
        }
    }

    async fn list(&self, client: &Client) -> Result<Vec<Value>> {
        let body = client.get(self.kind.list).await?;
        Ok(items(body))
    }

    /// Listing entry for `name`.
    async fn find(&self, client: &Client, name: &str) -> Result<Value> {
        self.list(client)
            .await?
            .into_iter()
            .find(|item| self.item_name(item) == Some(name))
            .ok_or_else(|| Error::not_found(self.kind.kind, name).into())
    }

    /// Full server document for `name`, with its id.
    async fn read(&self, client: &Client, name: &str) -> Result<(String, Value)> {
        let entry = self.find(client, name).await?;
        let id = self.id_of(&entry)?;
        let doc = client.get(&self.item_path(&id)).await?;
        Ok((id, doc))
    }

    /// `doc` without server-assigned fields or the id, so nothing from
    /// another server is sent or mistaken for the created item's id.
    fn stripped(&self, doc: Value) -> Value {
        let mut doc = doc;
        if let Some(map) = doc.as_object_mut() {
            for field in SERVER_FIELDS {
                map.remove(field);
            }
            if self.kind.id_field != self.kind.name_field {
                map.remove(self.kind.id_field);
            }
        }
        doc
    }

    /// Request body for create / update.
    fn body(&self, doc: Value) -> Value {
        let doc = self.stripped(doc);
        match self.kind.wrap {
            Some(key) => {
                let mut wrapped = Map::new();
                wrapped.insert(key.to_string(), doc);
                Value::Object(wrapped)
            }
            None => doc,
        }
    }

    /// Server view of a created or updated item, falling back to what was
    /// sent when the server answers with no document.
    fn unwrap_response(&self, response: Value, sent: Value) -> Value {
        if let Some(inner) = self.kind.wrap.and_then(|k| response.get(k)) {
            return inner.clone();
        }
        match response {
            Value::Object(_) => response,
            _ => sent,
        }
    }

    async fn delete_item(&self, client: &Client, item: &Value) -> Result<()> {
        if let Some(guard) = self.kind.guard {
            guard(item)?;
        }
        let id = self.id_of(item)?;
        client.delete(&self.item_path(&id)).await?;
        Ok(())
    }

    fn describe_template(&self) -> String {
        self.kind
            .columns
            .iter()
            .map(|(header, field)| format!("{}: {{{{{}}}}}", title(header), field))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn control(&self, req: &Request, action: &str, done: &str) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let client = req.client().await?;
        let entry = self.find(client, name).await?;
        let id = self.id_of(&entry)?;
        let path = format!("{}/{}", self.item_path(&id), action);
        let result = client.put(&path, &Value::Object(Map::new())).await?;
        info!(kind = self.kind.kind, name, action, "service action");
        Ok(Response::text(format!("Successfully {} {} `{}`", done, self.kind.kind, name))
            .with_object(result))
    }
}

/// Items of a collection response: a bare array, or the first array found
/// under a known envelope key, or the first array-valued field.
fn items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in LIST_KEYS {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            map.into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn title(header: &str) -> String {
    let lower = header.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Reader for AssetRunner {
    async fn get(&self, req: &Request) -> Result<Response> {
        let client = req.client().await?;
        let mut items = self.list(client).await?;
        if let Options::List(opts) = &req.options {
            if let Some(filter) = &opts.filter {
                items.retain(|item| self.item_name(item).is_some_and(|n| n.contains(filter.as_str())));
            }
        }

        if items.is_empty() {
            return Ok(Response::text(format!("No {} found", self.kind.resource))
                .with_object(Value::Array(items)));
        }

        let headers: Vec<&str> = self.kind.columns.iter().map(|(h, _)| *h).collect();
        let rows = items
            .iter()
            .map(|item| {
                self.kind
                    .columns
                    .iter()
                    .map(|(_, field)| cell(item.get(*field)))
                    .collect()
            })
            .collect();
        Ok(Response::table(&headers, rows, Value::Array(items)))
    }

    async fn describe(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let client = req.client().await?;
        let (_, doc) = self.read(client, name).await?;
        Ok(Response {
            object: Some(doc),
            template: self.describe_template(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Writer for AssetRunner {
    async fn create(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let client = req.client().await?;
        if self.exists(client, name).await? {
            return Err(Error::AlreadyExists(format!(
                "{} '{}' already exists",
                self.kind.kind, name
            ))
            .into());
        }

        let mut doc = Map::new();
        if let Options::Create(opts) = &req.options {
            if let Some(props) = &opts.properties {
                doc.extend(props.clone());
            }
            if let Some(description) = &opts.description {
                doc.insert("description".into(), Value::String(description.clone()));
            }
        }
        doc.insert(self.kind.name_field.into(), Value::String(name.to_string()));

        let created = Transfer::load(self, client, Value::Object(doc), &req.options).await?;
        info!(kind = self.kind.kind, name, "created");
        Ok(Response::text(format!("Successfully created {} `{}`", self.kind.kind, name))
            .with_object(created))
    }

    async fn delete(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let client = req.client().await?;
        let entry = self.find(client, name).await?;
        self.delete_item(client, &entry).await?;
        info!(kind = self.kind.kind, name, "deleted");
        Ok(Response::text(format!("Successfully deleted {} `{}`", self.kind.kind, name))
            .with_object(entry))
    }

    async fn clear(&self, req: &Request) -> Result<Response> {
        let client = req.client().await?;
        let items = self.list(client).await?;
        let mut deleted = Vec::with_capacity(items.len());
        for item in &items {
            self.delete_item(client, item).await?;
            deleted.push(Value::String(self.item_name(item).unwrap_or_default().to_string()));
        }
        info!(kind = self.kind.kind, count = deleted.len(), "cleared");
        Ok(Response::text(format!(
            "Deleted {} {}",
            deleted.len(),
            self.kind.resource
        ))
        .with_object(Value::Array(deleted)))
    }
}

#[async_trait]
impl Copier for AssetRunner {
    async fn copy(&self, req: &Request) -> Result<Response> {
        copy::copy(self, CopyRequest::new(req, self.kind.kind))
            .await
            .map(Response::from)
    }

    async fn copy_from(&self, client: &Client, name: &str, options: &Options) -> Result<Value> {
        self.fetch(client, name, options).await
    }

    async fn copy_to(
        &self,
        client: &Client,
        value: Value,
        replace: bool,
        options: &Options,
    ) -> Result<Value> {
        copy::place(self, client, value, replace, options).await
    }
}

#[async_trait]
impl Editor for AssetRunner {
    async fn edit(&self, req: &Request) -> Result<Response> {
        editor::run_edit(self, req).await
    }
}

#[async_trait]
impl Importer for AssetRunner {
    async fn import(&self, req: &Request) -> Result<Response> {
        transfer::run_import(self, req).await
    }
}

#[async_trait]
impl Exporter for AssetRunner {
    async fn export(&self, req: &Request) -> Result<Response> {
        transfer::run_export(self, req).await
    }
}

#[async_trait]
impl Gitter for AssetRunner {
    async fn pull(&self, req: &Request) -> Result<Response> {
        transfer::run_pull(self, req).await
    }

    async fn push(&self, req: &Request) -> Result<Response> {
        transfer::run_push(self, req).await
    }
}

#[async_trait]
impl Dumper for AssetRunner {
    async fn dump(&self, req: &Request) -> Result<Response> {
        transfer::run_dump(self, req).await
    }

    async fn load(&self, req: &Request) -> Result<Response> {
        transfer::run_load(self, req).await
    }
}

#[async_trait]
impl Controller for AssetRunner {
    async fn start(&self, req: &Request) -> Result<Response> {
        self.control(req, "start", "started").await
    }

    async fn stop(&self, req: &Request) -> Result<Response> {
        self.control(req, "stop", "stopped").await
    }

    async fn restart(&self, req: &Request) -> Result<Response> {
        self.control(req, "restart", "restarted").await
    }
}

#[async_trait]
impl Inspector for AssetRunner {
    async fn inspect(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let client = req.client().await?;
        let entry = self.find(client, name).await?;
        let id = self.id_of(&entry)?;
        let health = client.get(&format!("{}/health", self.item_path(&id))).await?;
        let row = vec![
            name.to_string(),
            cell(health.get("state")),
            cell(health.get("connection").and_then(|c| c.get("state"))),
        ];
        Ok(Response::table(&["NAME", "STATE", "CONNECTION"], vec![row], health))
    }
}

#[async_trait]
impl Transfer for AssetRunner {
    fn kind(&self) -> &str {
        self.kind.kind
    }

    async fn fetch(&self, client: &Client, name: &str, _options: &Options) -> Result<Value> {
        let (_, doc) = self.read(client, name).await?;
        Ok(match self.kind.codec {
            Codec::Plain => doc,
            Codec::Project => projects::exported(doc),
        })
    }

    async fn exists(&self, client: &Client, name: &str) -> Result<bool> {
        match self.find(client, name).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, client: &Client, name: &str) -> Result<()> {
        let entry = self.find(client, name).await?;
        self.delete_item(client, &entry).await
    }

    async fn load(&self, client: &Client, doc: Value, _options: &Options) -> Result<Value> {
        let sent = self.stripped(doc);
        debug!(kind = self.kind.kind, path = self.kind.list, "create");
        let response = client.post(self.kind.list, &self.body(sent.clone())).await?;
        Ok(self.unwrap_response(response, sent))
    }

    async fn list_names(&self, client: &Client) -> Result<Vec<String>> {
        Ok(self
            .list(client)
            .await?
            .iter()
            .filter_map(|item| self.item_name(item).map(str::to_string))
            .collect())
    }

    async fn update(&self, client: &Client, name: &str, doc: Value) -> Result<Value> {
        let entry = self.find(client, name).await?;
        let id = self.id_of(&entry)?;
        let sent = self.stripped(doc);
        let response = client.put(&self.item_path(&id), &self.body(sent.clone())).await?;
        info!(kind = self.kind.kind, name, "updated");
        Ok(self.unwrap_response(response, sent))
    }

    fn name_of(&self, doc: &Value) -> Result<String> {
        self.item_name(doc).map(str::to_string).ok_or_else(|| {
            Error::Validation(format!(
                "{} document is missing '{}'",
                self.kind.kind, self.kind.name_field
            ))
            .into()
        })
    }

    fn encode(&self, doc: &Value, name: &str, options: &Options) -> Result<Vec<(PathBuf, Value)>> {
        match self.kind.codec {
            Codec::Plain => Ok(vec![(
                PathBuf::from(transfer::export_filename(name, self.kind.kind)),
                doc.clone(),
            )]),
            Codec::Project => projects::encode(doc, name, options),
        }
    }

    fn decode_path(&self, path: &Path, _options: &Options) -> Result<Value> {
        match self.kind.codec {
            Codec::Plain => transfer::read_document(path),
            Codec::Project => projects::decode_path(path),
        }
    }

    async fn after_import(&self, client: &Client, created: &Value, options: &Options) -> Result<()> {
        if self.kind.codec != Codec::Project || !projects::has_members(options) {
            return Ok(());
        }
        // The create response may be empty; look the project up again on
        // this server rather than trusting an id from the imported file.
        let name = self.name_of(created)?;
        let (id, current) = self.read(client, &name).await?;
        projects::attach_members(client, &self.item_path(&id), &current, options).await
    }
}

impl Runner for AssetRunner {
    fn name(&self) -> &str {
        self.kind.resource
    }

    fn flags(&self) -> HandlerFlags {
        let mut flags = HandlerFlags::new().with(Verb::Get, ListFlags);
        if self.kind.caps.write {
            flags = flags.with(Verb::Create, CreateFlags);
        }
        match self.kind.codec {
            Codec::Plain => flags,
            Codec::Project => projects::flags(flags),
        }
    }

    fn reader(&self) -> Option<&dyn Reader> {
        self.kind.caps.read.then_some(self as &dyn Reader)
    }
    fn writer(&self) -> Option<&dyn Writer> {
        self.kind.caps.write.then_some(self as &dyn Writer)
    }
    fn copier(&self) -> Option<&dyn Copier> {
        self.kind.caps.copy.then_some(self as &dyn Copier)
    }
    fn editor(&self) -> Option<&dyn Editor> {
        self.kind.caps.edit.then_some(self as &dyn Editor)
    }
    fn importer(&self) -> Option<&dyn Importer> {
        self.kind.caps.transfer.then_some(self as &dyn Importer)
    }
    fn exporter(&self) -> Option<&dyn Exporter> {
        self.kind.caps.transfer.then_some(self as &dyn Exporter)
    }
    fn controller(&self) -> Option<&dyn Controller> {
        self.kind.caps.control.then_some(self as &dyn Controller)
    }
    fn inspector(&self) -> Option<&dyn Inspector> {
        self.kind.caps.inspect.then_some(self as &dyn Inspector)
    }
    fn gitter(&self) -> Option<&dyn Gitter> {
        self.kind.caps.git.then_some(self as &dyn Gitter)
    }
    fn dumper(&self) -> Option<&dyn Dumper> {
        self.kind.caps.dump.then_some(self as &dyn Dumper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::kinds;
    use crate::runner::Capability;
    use serde_json::json;

    fn runner(resource: &str) -> AssetRunner {
        AssetRunner::new(kinds::find(resource).unwrap())
    }

    #[test]
    fn collection_envelopes_are_unwrapped() {
        assert_eq!(items(json!([{"a": 1}])).len(), 1);
        assert_eq!(items(json!({"total": 2, "results": [1, 2]})).len(), 2);
        assert_eq!(items(json!({"count": 1, "things": [1]})).len(), 1);
        assert!(items(json!("nope")).is_empty());
    }

    #[test]
    fn body_drops_server_fields_and_wraps() {
        let r = runner("automations");
        let body = r.body(json!({"_id": "1", "name": "a", "created": "t"}));
        assert_eq!(body, json!({"automation": {"name": "a"}}));

        let r = runner("adapters");
        assert_eq!(r.body(json!({"name": "a"})), json!({"name": "a"}));
    }

    #[test]
    fn created_fallback_never_carries_a_foreign_id() {
        let r = runner("projects");
        let sent = r.stripped(json!({"_id": "source-id", "name": "Acme"}));
        assert_eq!(r.unwrap_response(Value::Null, sent), json!({"name": "Acme"}));
    }

    #[tokio::test]
    async fn project_import_without_members_skips_lookup() {
        let mut profile = crate::config::Config::minimal().active().unwrap().clone();
        profile.host = "127.0.0.1".into();
        profile.port = 9;
        profile.use_tls = false;
        let client = Client::new(&profile).unwrap();

        let r = runner("projects");
        r.after_import(&client, &json!({"name": "Acme"}), &Options::None)
            .await
            .unwrap();
        r.after_import(&client, &json!({}), &Options::Project(Default::default()))
            .await
            .unwrap();
    }

    #[test]
    fn describe_template_lists_columns() {
        assert_eq!(
            runner("workflows").describe_template(),
            "Name: {{name}}\nDescription: {{description}}"
        );
    }

    #[test]
    fn capabilities_follow_kind_table() {
        assert_eq!(
            runner("accounts").capabilities(),
            vec![Capability::Reader]
        );
        let adapters = runner("adapters").capabilities();
        assert!(adapters.contains(&Capability::Controller));
        assert!(adapters.contains(&Capability::Inspector));
        assert!(!adapters.contains(&Capability::Writer));

        let workflows = runner("workflows").capabilities();
        assert!(workflows.contains(&Capability::Gitter));
        assert!(workflows.contains(&Capability::Copier));
        assert!(!workflows.contains(&Capability::Controller));
    }

    #[test]
    fn project_runner_declares_member_flags() {
        let flags = runner("projects").flags();
        assert!(flags.get(Verb::Import).is_some());
        assert!(flags.get(Verb::Export).is_some());
        assert!(runner("workflows").flags().get(Verb::Import).is_none());
    }
}

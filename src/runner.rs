//! Runner contract: verbs, capability sets, requests and responses.
//!
//! A [`Runner`] owns the verb implementations for one resource type. Rather
//! than probing types at runtime, every runner *declares* the capability
//! sets it implements by returning `Some(self)` from the matching accessor
//! ([`Runner::reader`], [`Runner::writer`], …). The [`Registry`] reads those
//! declarations once at startup.
//!
//! | Capability | Verbs |
//! |------------|-------|
//! | [`Reader`] | `get`, `describe` |
//! | [`Writer`] | `create`, `delete`, `clear` |
//! | [`Copier`] | `copy` |
//! | [`Editor`] | `edit` |
//! | [`Importer`] | `import` |
//! | [`Exporter`] | `export` |
//! | [`Controller`] | `start`, `stop`, `restart` |
//! | [`Inspector`] | `inspect` |
//! | [`Gitter`] | `pull`, `push` |
//! | [`Dumper`] | `dump`, `load` |
//!
//! [`Registry`]: crate::registry::Registry

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::client::Client;
use crate::error::Error;
use crate::flags::{Common, HandlerFlags, Options};
use crate::runtime::Runtime;

/// Every verb that can appear as a top-level command group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Describe,
    Create,
    Delete,
    Clear,
    Copy,
    Import,
    Export,
    Start,
    Stop,
    Restart,
    Inspect,
    Edit,
    Pull,
    Push,
    Dump,
    Load,
}

impl Verb {
    pub const ALL: [Verb; 17] = [
        Verb::Get,
        Verb::Describe,
        Verb::Create,
        Verb::Delete,
        Verb::Clear,
        Verb::Copy,
        Verb::Import,
        Verb::Export,
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Inspect,
        Verb::Edit,
        Verb::Pull,
        Verb::Push,
        Verb::Dump,
        Verb::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Describe => "describe",
            Verb::Create => "create",
            Verb::Delete => "delete",
            Verb::Clear => "clear",
            Verb::Copy => "copy",
            Verb::Import => "import",
            Verb::Export => "export",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Inspect => "inspect",
            Verb::Edit => "edit",
            Verb::Pull => "pull",
            Verb::Push => "push",
            Verb::Dump => "dump",
            Verb::Load => "load",
        }
    }

    /// One-line help for the verb's parent command.
    pub fn about(&self) -> &'static str {
        match self {
            Verb::Get => "Display one or many resources",
            Verb::Describe => "Show details of a specific resource",
            Verb::Create => "Create a resource on the server",
            Verb::Delete => "Delete a resource from the server",
            Verb::Clear => "Delete all resources of a type",
            Verb::Copy => "Copy a resource between two servers",
            Verb::Import => "Import a resource from a file or repository",
            Verb::Export => "Export a resource to a file or repository",
            Verb::Start => "Start a service",
            Verb::Stop => "Stop a service",
            Verb::Restart => "Restart a service",
            Verb::Inspect => "Show the runtime state of a service",
            Verb::Edit => "Edit a resource in your editor",
            Verb::Pull => "Pull a resource from a Git repository",
            Verb::Push => "Push a resource to a Git repository",
            Verb::Dump => "Export every resource of a type to a directory",
            Verb::Load => "Import every resource file found in a directory",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Verb::Get | Verb::Describe => Capability::Reader,
            Verb::Create | Verb::Delete | Verb::Clear => Capability::Writer,
            Verb::Copy => Capability::Copier,
            Verb::Edit => Capability::Editor,
            Verb::Import => Capability::Importer,
            Verb::Export => Capability::Exporter,
            Verb::Start | Verb::Stop | Verb::Restart => Capability::Controller,
            Verb::Inspect => Capability::Inspector,
            Verb::Pull | Verb::Push => Capability::Gitter,
            Verb::Dump | Verb::Load => Capability::Dumper,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Verb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown verb: {}", s))
    }
}

/// A named family of verbs implemented together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Reader,
    Writer,
    Copier,
    Editor,
    Importer,
    Exporter,
    Controller,
    Inspector,
    Gitter,
    Dumper,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::Reader,
        Capability::Writer,
        Capability::Copier,
        Capability::Editor,
        Capability::Importer,
        Capability::Exporter,
        Capability::Controller,
        Capability::Inspector,
        Capability::Gitter,
        Capability::Dumper,
    ];

    pub fn verbs(&self) -> Vec<Verb> {
        Verb::ALL
            .iter()
            .copied()
            .filter(|v| v.capability() == *self)
            .collect()
    }
}

/// Input to a runner method. Built fresh for every invocation.
#[derive(Clone)]
pub struct Request {
    /// Positional arguments after the resource noun.
    pub args: Vec<String>,
    /// Flags shared by every runner for this verb.
    pub common: Common,
    /// Runner-specific flags for this verb.
    pub options: Options,
    pub runtime: Arc<Runtime>,
    /// The runner the request is addressed to.
    pub runner: Arc<dyn Runner>,
}

impl Request {
    /// The `n`-th positional argument, or a validation error naming `what`.
    pub fn arg(&self, n: usize, what: &str) -> Result<&str> {
        self.args
            .get(n)
            .map(String::as_str)
            .ok_or_else(|| Error::Validation(format!("missing required argument: {}", what)).into())
    }

    pub async fn client(&self) -> Result<&Client> {
        self.runtime.client().await
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("args", &self.args)
            .field("common", &self.common)
            .field("options", &self.options)
            .field("runner", &self.runner.name())
            .finish()
    }
}

/// Output of a runner method, consumed by the renderer.
///
/// Non-empty `keys` means `text` holds tab-separated rows (first row is the
/// header). Non-empty `template` means the human renderer substitutes
/// `{{field}}` placeholders from `object`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub object: Option<Value>,
    pub text: String,
    pub template: String,
    pub keys: Vec<String>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Tabular response: a header row from `keys` followed by `rows`,
    /// joined with tabs.
    pub fn table(keys: &[&str], rows: Vec<Vec<String>>, object: Value) -> Self {
        let mut lines = vec![keys.join("\t")];
        lines.extend(rows.into_iter().map(|r| r.join("\t")));
        Self {
            object: Some(object),
            text: lines.join("\n"),
            template: String::new(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
pub trait Reader: Send + Sync {
    async fn get(&self, req: &Request) -> Result<Response>;
    async fn describe(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Writer: Send + Sync {
    async fn create(&self, req: &Request) -> Result<Response>;
    async fn delete(&self, req: &Request) -> Result<Response>;
    async fn clear(&self, req: &Request) -> Result<Response>;
}

/// Cross-server copy. `copy` drives the protocol in [`crate::copy`];
/// `copy_from` / `copy_to` are the per-server halves.
#[async_trait]
pub trait Copier: Send + Sync {
    async fn copy(&self, req: &Request) -> Result<Response>;

    /// Reads `name` from the source server in its exported form.
    async fn copy_from(&self, client: &Client, name: &str, options: &Options) -> Result<Value>;

    /// Creates `value` on the destination server, replacing a same-name
    /// resource only when `replace` is set.
    async fn copy_to(
        &self,
        client: &Client,
        value: Value,
        replace: bool,
        options: &Options,
    ) -> Result<Value>;
}

#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Controller: Send + Sync {
    async fn start(&self, req: &Request) -> Result<Response>;
    async fn stop(&self, req: &Request) -> Result<Response>;
    async fn restart(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Inspector: Send + Sync {
    async fn inspect(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Gitter: Send + Sync {
    async fn pull(&self, req: &Request) -> Result<Response>;
    async fn push(&self, req: &Request) -> Result<Response>;
}

#[async_trait]
pub trait Dumper: Send + Sync {
    async fn dump(&self, req: &Request) -> Result<Response>;
    async fn load(&self, req: &Request) -> Result<Response>;
}

/// A per-resource dispatch target.
///
/// Capability accessors default to `None`; a runner opts into a capability
/// set by returning `Some(self)`.
pub trait Runner: Send + Sync {
    /// Resource name as used in the descriptor catalog, e.g. `"workflows"`.
    fn name(&self) -> &str;

    /// Runner-specific flags, per verb.
    fn flags(&self) -> HandlerFlags {
        HandlerFlags::default()
    }

    fn reader(&self) -> Option<&dyn Reader> {
        None
    }
    fn writer(&self) -> Option<&dyn Writer> {
        None
    }
    fn copier(&self) -> Option<&dyn Copier> {
        None
    }
    fn editor(&self) -> Option<&dyn Editor> {
        None
    }
    fn importer(&self) -> Option<&dyn Importer> {
        None
    }
    fn exporter(&self) -> Option<&dyn Exporter> {
        None
    }
    fn controller(&self) -> Option<&dyn Controller> {
        None
    }
    fn inspector(&self) -> Option<&dyn Inspector> {
        None
    }
    fn gitter(&self) -> Option<&dyn Gitter> {
        None
    }
    fn dumper(&self) -> Option<&dyn Dumper> {
        None
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Reader => self.reader().is_some(),
            Capability::Writer => self.writer().is_some(),
            Capability::Copier => self.copier().is_some(),
            Capability::Editor => self.editor().is_some(),
            Capability::Importer => self.importer().is_some(),
            Capability::Exporter => self.exporter().is_some(),
            Capability::Controller => self.controller().is_some(),
            Capability::Inspector => self.inspector().is_some(),
            Capability::Gitter => self.gitter().is_some(),
            Capability::Dumper => self.dumper().is_some(),
        }
    }

    /// The capability sets this runner declares.
    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.supports(*c))
            .collect()
    }
}

/// Calls the runner method bound to `verb`.
pub async fn dispatch(verb: Verb, runner: &dyn Runner, req: &Request) -> Result<Response> {
    let missing = || -> anyhow::Error {
        Error::NotImplemented {
            verb: verb.to_string(),
            resource: runner.name().to_string(),
        }
        .into()
    };

    match verb {
        Verb::Get => runner.reader().ok_or_else(missing)?.get(req).await,
        Verb::Describe => runner.reader().ok_or_else(missing)?.describe(req).await,
        Verb::Create => runner.writer().ok_or_else(missing)?.create(req).await,
        Verb::Delete => runner.writer().ok_or_else(missing)?.delete(req).await,
        Verb::Clear => runner.writer().ok_or_else(missing)?.clear(req).await,
        Verb::Copy => runner.copier().ok_or_else(missing)?.copy(req).await,
        Verb::Edit => runner.editor().ok_or_else(missing)?.edit(req).await,
        Verb::Import => runner.importer().ok_or_else(missing)?.import(req).await,
        Verb::Export => runner.exporter().ok_or_else(missing)?.export(req).await,
        Verb::Start => runner.controller().ok_or_else(missing)?.start(req).await,
        Verb::Stop => runner.controller().ok_or_else(missing)?.stop(req).await,
        Verb::Restart => runner.controller().ok_or_else(missing)?.restart(req).await,
        Verb::Inspect => runner.inspector().ok_or_else(missing)?.inspect(req).await,
        Verb::Pull => runner.gitter().ok_or_else(missing)?.pull(req).await,
        Verb::Push => runner.gitter().ok_or_else(missing)?.push(req).await,
        Verb::Dump => runner.dumper().ok_or_else(missing)?.dump(req).await,
        Verb::Load => runner.dumper().ok_or_else(missing)?.load(req).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    #[async_trait]
    impl Reader for ReadOnly {
        async fn get(&self, _req: &Request) -> Result<Response> {
            Ok(Response::text("listed"))
        }
        async fn describe(&self, _req: &Request) -> Result<Response> {
            Ok(Response::text("described"))
        }
    }

    impl Runner for ReadOnly {
        fn name(&self) -> &str {
            "widgets"
        }
        fn reader(&self) -> Option<&dyn Reader> {
            Some(self)
        }
    }

    #[test]
    fn capabilities_follow_accessors() {
        assert_eq!(ReadOnly.capabilities(), vec![Capability::Reader]);
        assert!(!ReadOnly.supports(Capability::Writer));
    }

    #[test]
    fn every_verb_belongs_to_exactly_one_capability() {
        let total: usize = Capability::ALL.iter().map(|c| c.verbs().len()).sum();
        assert_eq!(total, Verb::ALL.len());
        assert_eq!(
            Capability::Controller.verbs(),
            vec![Verb::Start, Verb::Stop, Verb::Restart]
        );
    }

    #[test]
    fn verb_names_round_trip() {
        for verb in Verb::ALL {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
        assert!("frobnicate".parse::<Verb>().is_err());
    }

    #[test]
    fn table_response_has_header_row() {
        let resp = Response::table(
            &["NAME", "DESCRIPTION"],
            vec![vec!["a".into(), "first".into()]],
            Value::Null,
        );
        assert_eq!(resp.text, "NAME\tDESCRIPTION\na\tfirst");
        assert_eq!(resp.keys, vec!["NAME", "DESCRIPTION"]);
    }

    #[tokio::test]
    async fn dispatch_reports_missing_capability() {
        let runtime = Arc::new(Runtime::for_tests());
        let runner: Arc<dyn Runner> = Arc::new(ReadOnly);
        let req = Request {
            args: vec![],
            common: Common::None,
            options: Options::None,
            runtime,
            runner: runner.clone(),
        };
        let resp = dispatch(Verb::Get, runner.as_ref(), &req).await.unwrap();
        assert_eq!(resp.text, "listed");

        let err = dispatch(Verb::Delete, runner.as_ref(), &req).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotImplemented { .. })
        ));
    }
}

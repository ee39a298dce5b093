//! Cross-server copy.
//!
//! `copy <noun> <name> --from A --to B [--replace]` reads the resource from
//! profile `A` and creates it on profile `B`. Each side gets its own
//! short-lived client (and deadline); both are dropped when the command
//! returns. The copy is not atomic: if the destination delete succeeds and
//! the create fails, the resource is missing on `B` until retried.

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use crate::client::Client;
use crate::error::{is_not_found, Error};
use crate::flags::{Common, CopyCommon, Options};
use crate::runner::{Request, Response};
use crate::transfer::Transfer;

/// The originating request plus the resource type being copied.
#[derive(Debug)]
pub struct CopyRequest<'a> {
    pub request: &'a Request,
    pub kind: &'a str,
}

impl<'a> CopyRequest<'a> {
    pub fn new(request: &'a Request, kind: &'a str) -> Self {
        Self { request, kind }
    }

    fn flags(&self) -> Result<&'a CopyCommon> {
        match &self.request.common {
            Common::Copy(c) => Ok(c),
            _ => Err(Error::Validation("copy flags missing".into()).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyResponse {
    pub name: String,
    pub from: String,
    pub to: String,
    pub object: Option<Value>,
}

impl From<CopyResponse> for Response {
    fn from(c: CopyResponse) -> Self {
        Response::text(format!(
            "Successfully copied `{}` from `{}` to `{}`",
            c.name, c.from, c.to
        ))
        .with_object(c.object.unwrap_or(Value::Null))
    }
}

/// Runs the copy protocol for `runner` (the `copy_from` / `copy_to`
/// halves of a [`crate::runner::Copier`]).
pub async fn copy(
    runner: &dyn crate::runner::Copier,
    req: CopyRequest<'_>,
) -> Result<CopyResponse> {
    let name = req.request.arg(0, "name")?;
    let flags = req.flags()?;

    if flags.from == flags.to {
        return Err(Error::Validation(format!(
            "source and destination profiles must differ (both are '{}')",
            flags.from
        ))
        .into());
    }

    let runtime = &req.request.runtime;
    let source = runtime.client_for(&flags.from)?;
    let destination = runtime.client_for(&flags.to)?;

    let value = runner.copy_from(&source, name, &req.request.options).await?;
    let object = runner
        .copy_to(&destination, value, flags.replace, &req.request.options)
        .await?;

    info!(kind = req.kind, name, from = %flags.from, to = %flags.to, "copied");
    Ok(CopyResponse {
        name: name.to_string(),
        from: flags.from.clone(),
        to: flags.to.clone(),
        object: Some(object),
    })
}

/// Destination half shared by transferable runners: create `value`,
/// deleting a same-name resource first only when `replace` is set.
pub async fn place(
    t: &dyn Transfer,
    client: &Client,
    value: Value,
    replace: bool,
    options: &Options,
) -> Result<Value> {
    t.validate(&value)?;
    let name = t.name_of(&value)?;

    if t.exists(client, &name).await? {
        if !replace {
            return Err(Error::AlreadyExists(format!(
                "{} '{}' exists on the destination server, use --replace",
                t.kind(),
                name
            ))
            .into());
        }
        match t.remove(client, &name).await {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e),
        }
    }

    let created = t.load(client, value, options).await?;
    t.after_import(client, &created, options).await?;
    Ok(created)
}

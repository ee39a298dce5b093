//! `api <method> <path>`: raw authenticated request against the active
//! profile. The response body is rendered as an object.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Error;
use crate::runner::Response;
use crate::runtime::Runtime;

const METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

pub fn command() -> Command {
    Command::new("api")
        .about("Send a raw request to the server API")
        .long_about(
            "Send an authenticated request to an arbitrary API path on the active \
             profile and print the response body.",
        )
        .after_help("Examples:\n  ipctl api get /workflows\n  ipctl api post /tags --data '{\"name\":\"x\"}'")
        .arg(
            Arg::new("method")
                .required(true)
                .value_parser(METHODS)
                .help("HTTP method"),
        )
        .arg(Arg::new("path").required(true).help("Request path, e.g. /workflows"))
        .arg(
            Arg::new("data")
                .long("data")
                .short('d')
                .value_name("JSON")
                .help("JSON request body"),
        )
}

pub fn parse_method(name: &str) -> Result<Method> {
    match name.to_ascii_lowercase().as_str() {
        "get" => Ok(Method::GET),
        "post" => Ok(Method::POST),
        "put" => Ok(Method::PUT),
        "patch" => Ok(Method::PATCH),
        "delete" => Ok(Method::DELETE),
        other => Err(Error::Validation(format!("unsupported method '{}'", other)).into()),
    }
}

pub async fn execute(m: &ArgMatches, runtime: Arc<Runtime>) -> Result<Response> {
    let method = parse_method(m.get_one::<String>("method").map(String::as_str).unwrap_or("get"))?;
    let path = m
        .get_one::<String>("path")
        .ok_or_else(|| Error::Validation("missing required argument: path".into()))?;
    let body = match m.get_one::<String>("data") {
        Some(raw) => Some(
            serde_json::from_str::<Value>(raw)
                .map_err(|e| Error::Validation(format!("--data is not valid JSON: {}", e)))?,
        ),
        None => None,
    };

    let client = runtime.client().await?;
    let value = client.send(method, path, body.as_ref()).await?;
    let text = match &value {
        Value::String(s) => s.clone(),
        Value::Null => String::from("(empty response)"),
        other => crate::render::to_json_pretty(other)?,
    };
    Ok(Response::text(text).with_object(value))
}

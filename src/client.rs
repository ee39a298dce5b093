//! HTTP client bound to one server profile.
//!
//! # Authentication
//!
//! The client logs in lazily on the first request and caches the token for
//! its own lifetime:
//!
//! - profiles with a `client_id` use OAuth client credentials
//!   (`POST /oauth/token`);
//! - all others post username and password to `/login`.
//!
//! The token is sent as a bearer `Authorization` header.
//!
//! # Errors
//!
//! Non-2xx responses are turned into [`Error::Server`] using a single
//! error envelope: the first of `message`, `error.message` or `error`
//! (string) found in a JSON body, otherwise the body text verbatim.
//! Connection failures and timeouts become [`Error::Transport`].

use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::Profile;
use crate::error::Error;

pub struct Client {
    http: reqwest::Client,
    profile: Profile,
    base_url: String,
    token: OnceCell<String>,
}

impl Client {
    /// Builds a client for `profile`. The request deadline is
    /// `profile.timeout` seconds, or none when it is `0`.
    pub fn new(profile: &Profile) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(!profile.verify)
            .user_agent(concat!("ipctl/", env!("CARGO_PKG_VERSION")));
        if profile.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(profile.timeout));
        }
        let http = builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: profile.base_url(),
            profile: profile.clone(),
            token: OnceCell::new(),
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None).await
    }

    /// Sends an authenticated request and decodes the body.
    ///
    /// Empty bodies decode to `null`; bodies that are not JSON are returned
    /// as a JSON string.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let token = self.token().await?;
        let url = self.url(path);
        debug!(method = %method, url = %url, "request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| transport(&url, e))?;
        read_body(&url, response).await
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn token(&self) -> Result<&str> {
        self.token
            .get_or_try_init(|| self.login())
            .await
            .map(String::as_str)
    }

    async fn login(&self) -> Result<String> {
        match (&self.profile.client_id, &self.profile.client_secret) {
            (Some(id), Some(secret)) => {
                let url = self.url("/oauth/token");
                debug!(url = %url, client_id = %id, "oauth login");
                let response = self
                    .http
                    .post(&url)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", id.as_str()),
                        ("client_secret", secret.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| transport(&url, e))?;
                let body = read_body(&url, response).await?;
                body.get("access_token")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::Server {
                            status: 200,
                            message: "token response did not contain access_token".into(),
                        }
                        .into()
                    })
            }
            _ => {
                let url = self.url("/login");
                debug!(url = %url, username = %self.profile.username, "login");
                let response = self
                    .http
                    .post(&url)
                    .json(&json!({
                        "user": {
                            "username": self.profile.username,
                            "password": self.profile.password,
                        }
                    }))
                    .send()
                    .await
                    .map_err(|e| transport(&url, e))?;
                match read_body(&url, response).await? {
                    Value::String(token) => Ok(token),
                    Value::Object(map) => map
                        .get("token")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            Error::Server {
                                status: 200,
                                message: "login response did not contain a token".into(),
                            }
                            .into()
                        }),
                    other => Ok(other.to_string()),
                }
            }
        }
    }
}

fn transport(url: &str, err: reqwest::Error) -> anyhow::Error {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    Error::Transport {
        url: url.to_string(),
        message,
    }
    .into()
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.map_err(|e| transport(url, e))?;
    debug!(url = %url, status = status.as_u16(), bytes = text.len(), "response");

    if !status.is_success() {
        return Err(Error::Server {
            status: status.as_u16(),
            message: error_message(&text),
        }
        .into());
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Extracts a human-readable message from a server error body.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.get("message"),
            value.get("error").and_then(|e| e.get("message")),
            value.get("error"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(s) = candidate.as_str() {
                return s.to_string();
            }
        }
    }
    body.trim().to_string()
}

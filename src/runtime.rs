//! Process-scoped runtime shared by every command body.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::client::Client;
use crate::config::Config;
use crate::descriptors::Descriptors;

/// Resolved configuration, the descriptor catalog, and the lazily-built
/// HTTP client for the active profile. Constructed once after argument
/// parsing and passed by reference into every request.
pub struct Runtime {
    pub config: Arc<Config>,
    pub descriptors: Arc<Descriptors>,
    pub verbose: bool,
    /// Effective output format (`--output` or `application.default_output`).
    pub output: String,
    client: OnceCell<Client>,
}

impl Runtime {
    pub fn new(
        config: Config,
        descriptors: Arc<Descriptors>,
        verbose: bool,
        output: Option<String>,
    ) -> Self {
        let output = output.unwrap_or_else(|| config.default_output.clone());
        Self {
            config: Arc::new(config),
            descriptors,
            verbose,
            output,
            client: OnceCell::new(),
        }
    }

    /// Client for the active profile, created on first use. Resolving an
    /// unknown profile fails here, at the first command that needs it.
    pub async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async { Client::new(self.config.active()?) })
            .await
    }

    /// A fresh client for a named profile. Used by cross-server copy,
    /// where each side owns its own connection and deadline.
    pub fn client_for(&self, profile: &str) -> Result<Client> {
        Client::new(self.config.profile(profile)?)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            Config::minimal(),
            Arc::new(Descriptors::default()),
            false,
            None,
        )
    }
}

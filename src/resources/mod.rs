//! Resource runners.
//!
//! Server resources share one generic [`asset::AssetRunner`] configured
//! from the [`kinds::KINDS`] table. The local configuration is exposed
//! through [`local`].

pub mod asset;
pub mod kinds;
pub mod local;
pub mod projects;

use std::sync::Arc;

use crate::runner::Runner;

/// Every runner, in registration order.
pub fn runners() -> Vec<Arc<dyn Runner>> {
    let mut runners: Vec<Arc<dyn Runner>> = kinds::KINDS
        .iter()
        .map(|kind| Arc::new(asset::AssetRunner::new(kind)) as Arc<dyn Runner>)
        .collect();
    runners.push(Arc::new(local::ProfilesRunner));
    runners.push(Arc::new(local::RepositoriesRunner));
    runners
}

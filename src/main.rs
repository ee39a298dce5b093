//! # ipctl
//!
//! ```bash
//! ipctl get workflows
//! ipctl describe project Acme -o yaml
//! ipctl export project Acme --expand --repository @assets
//! ipctl copy automation Nightly --from dev --to prod --replace
//! ```
//!
//! The command tree is assembled from the registered runners and the
//! embedded descriptors before argv is parsed; configuration is loaded
//! afterwards so `--config` and `--profile` can take part in resolution.

use std::sync::Arc;

use ipctl::config::{self, Env, Overrides};
use ipctl::descriptors::Descriptors;
use ipctl::handler::{self, CommandTree};
use ipctl::logging;
use ipctl::registry::Registry;
use ipctl::resources;
use ipctl::runtime::Runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let descriptors = Arc::new(Descriptors::load()?);
    let registry = Registry::new(resources::runners());
    let tree = handler::build(&registry, &descriptors);

    let matches = tree.command().get_matches();
    let globals = CommandTree::globals(&matches)?;

    let overrides = Overrides {
        config_path: globals.config.clone(),
        profile: globals.profile.clone(),
    };
    let cfg = config::load_config(&overrides, &Env::from_process())?;
    logging::init(&cfg, globals.verbose)?;

    let runtime = Arc::new(Runtime::new(
        cfg,
        descriptors,
        globals.verbose,
        globals.output,
    ));
    tree.execute(&matches, runtime).await
}

//! Embedded descriptor catalog.
//!
//! Every resource type ships one YAML document under `descriptors/` that
//! maps verb names to the help metadata for that `(resource, verb)` pair:
//!
//! ```yaml
//! describe:
//!   use: workflow <name>
//!   short: Display details about a workflow
//!   group: automation-studio
//!   exact_args: 1
//! ```
//!
//! The catalog is parsed once per process into a two-level map
//! (resource → verb → [`Descriptor`]) and never mutated afterwards. Verbs
//! that no runner implements are kept; the command-tree builder simply
//! never asks for them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Help metadata for one verb of one resource.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    /// Usage line: the command name followed by its positional arguments,
    /// e.g. `"workflow <name>"`.
    #[serde(rename = "use")]
    pub usage: String,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: String,
    #[serde(default)]
    pub example: String,
    /// Group ID the command is listed under (see [`group_id`]).
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub disabled: bool,
    /// Required number of positional arguments; `0` leaves arity open.
    #[serde(default)]
    pub exact_args: usize,
}

impl Descriptor {
    /// First word of the usage line, used as the subcommand name.
    pub fn command_name(&self) -> &str {
        self.usage.split_whitespace().next().unwrap_or_default()
    }

    /// Names of the `<placeholder>` tokens in the usage line.
    pub fn arg_names(&self) -> Vec<String> {
        self.usage
            .split_whitespace()
            .skip(1)
            .filter_map(|t| t.strip_prefix('<').and_then(|t| t.strip_suffix('>')))
            .map(|t| t.to_uppercase())
            .collect()
    }
}

/// Command groups, in help display order. IDs are derived with [`group_id`].
pub const GROUP_TITLES: &[&str] = &[
    "Automation Studio",
    "Operations Manager",
    "Admin Essentials",
    "Configuration Manager",
    "Lifecycle Manager",
    "Local Configuration",
];

/// Stable group identifier: lowercase title with spaces replaced by hyphens.
pub fn group_id(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

/// Display title for a group ID; unknown IDs are shown as-is.
pub fn group_title(id: &str) -> &str {
    GROUP_TITLES
        .iter()
        .copied()
        .find(|t| group_id(t) == id)
        .unwrap_or(id)
}

/// Position of a group ID in [`GROUP_TITLES`]; unknown groups sort last.
pub fn group_rank(id: &str) -> usize {
    GROUP_TITLES
        .iter()
        .position(|t| group_id(t) == id)
        .unwrap_or(GROUP_TITLES.len())
}

macro_rules! descriptor_files {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../descriptors/", $name, ".yaml")))),*]
    };
}

/// Embedded YAML documents, keyed by resource name.
const EMBEDDED: &[(&str, &str)] = descriptor_files![
    "accounts",
    "adapters",
    "analytic-templates",
    "applications",
    "automations",
    "command-templates",
    "configuration-parsers",
    "device-groups",
    "devices",
    "gctrees",
    "groups",
    "integration-models",
    "integrations",
    "json-forms",
    "methods",
    "models",
    "prebuilts",
    "profiles",
    "projects",
    "repositories",
    "role-types",
    "roles",
    "server-profiles",
    "tags",
    "templates",
    "transformations",
    "views",
    "workflows",
];

/// Resource → verb → descriptor.
#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    catalog: BTreeMap<String, BTreeMap<String, Descriptor>>,
}

impl Descriptors {
    /// Parses the catalog compiled into the binary.
    pub fn load() -> Result<Self> {
        Self::from_documents(EMBEDDED.iter().copied())
    }

    /// Parses `(resource, yaml)` pairs into a catalog.
    pub fn from_documents<'a, I>(docs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut catalog = BTreeMap::new();
        for (resource, text) in docs {
            let verbs: BTreeMap<String, Descriptor> = serde_yaml::from_str(text)
                .with_context(|| format!("Failed to parse descriptors for '{}'", resource))?;
            catalog.insert(resource.to_string(), verbs);
        }
        Ok(Self { catalog })
    }

    pub fn get(&self, resource: &str, verb: &str) -> Option<&Descriptor> {
        self.catalog.get(resource).and_then(|verbs| verbs.get(verb))
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.catalog.keys().map(String::as_str)
    }
}

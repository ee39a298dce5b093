//! Static table of server resource types.
//!
//! Each [`AssetKind`] tells the generic [`AssetRunner`](super::asset::AssetRunner)
//! where the resource lives on the server, how to name and identify its
//! items, and which capability sets it offers.

use anyhow::Result;
use serde_json::Value;

use crate::error::Error;

/// Capability switches for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caps {
    pub read: bool,
    pub write: bool,
    pub copy: bool,
    pub edit: bool,
    /// `import` and `export`.
    pub transfer: bool,
    /// `push` and `pull`.
    pub git: bool,
    /// `dump` and `load`.
    pub dump: bool,
    pub control: bool,
    pub inspect: bool,
}

impl Caps {
    pub const READ: Caps = Caps {
        read: true,
        write: false,
        copy: false,
        edit: false,
        transfer: false,
        git: false,
        dump: false,
        control: false,
        inspect: false,
    };

    pub const CRUD: Caps = Caps {
        write: true,
        ..Caps::READ
    };

    pub const SERVICE: Caps = Caps {
        control: true,
        inspect: true,
        ..Caps::READ
    };

    /// Everything a versioned automation asset supports.
    pub const ASSET: Caps = Caps {
        copy: true,
        edit: true,
        transfer: true,
        git: true,
        dump: true,
        ..Caps::CRUD
    };
}

/// How exported documents map onto files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// One `<name>.<kind>.json` per resource.
    Plain,
    /// Projects: members stripped, optional expanded layout.
    Project,
}

pub type Guard = fn(&Value) -> Result<()>;

#[derive(Clone, Copy)]
pub struct AssetKind {
    /// Plural resource noun, matching the descriptor catalog.
    pub resource: &'static str,
    /// Singular type tag used in filenames.
    pub kind: &'static str,
    /// Collection path; items live at `<list>/<id>`.
    pub list: &'static str,
    pub id_field: &'static str,
    pub name_field: &'static str,
    /// Request bodies are sent as `{ <wrap>: doc }` when set.
    pub wrap: Option<&'static str>,
    /// `get` table columns: header and top-level field.
    pub columns: &'static [(&'static str, &'static str)],
    pub caps: Caps,
    pub codec: Codec,
    /// Checked before an item is deleted.
    pub guard: Option<Guard>,
}

const NAME_DESCRIPTION: &[(&str, &str)] = &[("NAME", "name"), ("DESCRIPTION", "description")];
const NAME_STATE: &[(&str, &str)] = &[("NAME", "name"), ("STATE", "state")];

/// Provenance of groups managed by the platform itself.
pub const LOCAL_PROVENANCE: &str = "Pronghorn";

/// Only locally-managed groups may be deleted; groups synced from an
/// external directory are owned by that directory.
pub fn local_groups_only(group: &Value) -> Result<()> {
    let provenance = group
        .get("provenance")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if provenance == LOCAL_PROVENANCE {
        return Ok(());
    }
    let name = group.get("name").and_then(Value::as_str).unwrap_or_default();
    Err(Error::Validation(format!(
        "group '{}' has provenance '{}' and can only be deleted from its source",
        name, provenance
    ))
    .into())
}

const fn asset(resource: &'static str, kind: &'static str, list: &'static str) -> AssetKind {
    AssetKind {
        resource,
        kind,
        list,
        id_field: "_id",
        name_field: "name",
        wrap: None,
        columns: NAME_DESCRIPTION,
        caps: Caps::ASSET,
        codec: Codec::Plain,
        guard: None,
    }
}

const fn service(resource: &'static str, kind: &'static str, list: &'static str) -> AssetKind {
    AssetKind {
        id_field: "name",
        columns: NAME_STATE,
        caps: Caps::SERVICE,
        ..asset(resource, kind, list)
    }
}

pub const KINDS: &[AssetKind] = &[
    AssetKind {
        name_field: "username",
        columns: &[("NAME", "username"), ("EMAIL", "email"), ("PROVENANCE", "provenance")],
        caps: Caps::READ,
        ..asset("accounts", "account", "/authorization/accounts")
    },
    AssetKind {
        caps: Caps {
            transfer: true,
            dump: true,
            ..Caps::SERVICE
        },
        ..service("adapters", "adapter", "/adapters")
    },
    asset("analytic-templates", "analytic-template", "/automation-studio/analytic-templates"),
    service("applications", "application", "/applications"),
    AssetKind {
        wrap: Some("automation"),
        ..asset("automations", "automation", "/operations-manager/automations")
    },
    asset("command-templates", "command-template", "/mop/templates"),
    asset("configuration-parsers", "configuration-parser", "/configuration_manager/parsers"),
    AssetKind {
        caps: Caps::CRUD,
        ..asset("device-groups", "device-group", "/configuration_manager/deviceGroups")
    },
    AssetKind {
        columns: &[("NAME", "name"), ("HOST", "host"), ("TYPE", "device-type")],
        caps: Caps::READ,
        ..asset("devices", "device", "/configuration_manager/devices")
    },
    asset("gctrees", "gctree", "/configuration_manager/configs"),
    AssetKind {
        columns: &[("NAME", "name"), ("DESCRIPTION", "description"), ("PROVENANCE", "provenance")],
        caps: Caps::CRUD,
        guard: Some(local_groups_only),
        ..asset("groups", "group", "/authorization/groups")
    },
    AssetKind {
        id_field: "versionId",
        caps: Caps {
            transfer: true,
            ..Caps::CRUD
        },
        ..asset("integration-models", "integration-model", "/integration-models")
    },
    AssetKind {
        caps: Caps {
            write: true,
            ..Caps::SERVICE
        },
        ..service("integrations", "integration", "/integrations")
    },
    asset("json-forms", "json-form", "/json-forms/forms"),
    AssetKind {
        id_field: "name",
        caps: Caps::READ,
        ..asset("methods", "method", "/authorization/methods")
    },
    asset("models", "model", "/lifecycle-manager/resources"),
    AssetKind {
        caps: Caps {
            transfer: true,
            dump: true,
            ..Caps::CRUD
        },
        ..asset("prebuilts", "prebuilt", "/prebuilts")
    },
    AssetKind {
        codec: Codec::Project,
        ..asset("projects", "project", "/automation-studio/projects")
    },
    AssetKind {
        columns: &[("NAME", "name"), ("APPLICATION", "provenance")],
        caps: Caps::READ,
        ..asset("role-types", "role-type", "/authorization/roles/types")
    },
    AssetKind {
        caps: Caps {
            copy: true,
            transfer: true,
            git: true,
            ..Caps::CRUD
        },
        ..asset("roles", "role", "/authorization/roles")
    },
    AssetKind {
        id_field: "id",
        caps: Caps::CRUD,
        ..asset("server-profiles", "server-profile", "/profiles")
    },
    AssetKind {
        caps: Caps {
            copy: true,
            ..Caps::CRUD
        },
        ..asset("tags", "tag", "/tags")
    },
    asset("templates", "template", "/automation-studio/templates"),
    asset("transformations", "transformation", "/transformations"),
    AssetKind {
        columns: &[("PATH", "path"), ("DESCRIPTION", "description")],
        name_field: "path",
        caps: Caps::READ,
        ..asset("views", "view", "/authorization/views")
    },
    asset("workflows", "workflow", "/automation-studio/workflows"),
];

pub fn find(resource: &str) -> Option<&'static AssetKind> {
    KINDS.iter().find(|k| k.resource == resource)
}

//! Flag bundles passed to runner methods.
//!
//! Each command carries two bundles:
//!
//! - **Common** flags are shared by every runner for a verb (`copy` always
//!   takes `--from` / `--to` / `--replace`). They are modelled as the
//!   [`Common`] sum type, selected by verb.
//! - **Options** are runner-specific extras declared through a runner's
//!   [`HandlerFlags`], one optional [`Flagger`] per verb.
//!
//! The command body hands the right variant straight to the runner, so no
//! runtime downcasting is involved.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, Repository};
use crate::error::Error;
use crate::project::MemberSpec;
use crate::runner::Verb;

/// Git transport flags shared by `import` and `export`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitFlags {
    /// Bare URL or `@name` of a configured repository.
    pub repository: Option<String>,
    pub reference: Option<String>,
    pub private_key_file: Option<PathBuf>,
}

impl GitFlags {
    /// Resolves `--repository` against the config, applying the
    /// `--reference` / `--private-key-file` overrides. `None` when no
    /// repository was requested.
    pub fn resolve(&self, config: &Config) -> Result<Option<Repository>> {
        match &self.repository {
            None => Ok(None),
            Some(token) => resolve_repository(
                config,
                token,
                self.reference.as_deref(),
                self.private_key_file.as_ref(),
            )
            .map(Some),
        }
    }
}

/// Resolves a repository token and applies command-line overrides.
pub fn resolve_repository(
    config: &Config,
    token: &str,
    reference: Option<&str>,
    private_key_file: Option<&PathBuf>,
) -> Result<Repository> {
    let mut repo = config.resolve_repository(token)?;
    if let Some(reference) = reference {
        repo.reference = reference.to_string();
    }
    if let Some(key) = private_key_file {
        repo.private_key = None;
        repo.private_key_file = Some(crate::config::expand_tilde(key));
    }
    Ok(repo)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyCommon {
    pub from: String,
    pub to: String,
    pub replace: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportCommon {
    pub replace: bool,
    pub git: GitFlags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportCommon {
    pub path: Option<PathBuf>,
    pub git: GitFlags,
    pub message: Option<String>,
}

/// `push <name> <repository>`: the repository is positional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushCommon {
    pub path: Option<PathBuf>,
    pub reference: Option<String>,
    pub private_key_file: Option<PathBuf>,
    pub message: Option<String>,
}

/// `pull <repository> <filename>`: both positional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullCommon {
    pub replace: bool,
    pub reference: Option<String>,
    pub private_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpCommon {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadCommon {
    pub replace: bool,
}

/// Verb-wide flag bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Common {
    #[default]
    None,
    Copy(CopyCommon),
    Import(ImportCommon),
    Export(ExportCommon),
    Push(PushCommon),
    Pull(PullCommon),
    Dump(DumpCommon),
    Load(LoadCommon),
}

fn replace_arg() -> Arg {
    Arg::new("replace")
        .long("replace")
        .action(ArgAction::SetTrue)
        .help("Replace an existing resource with the same name")
}

fn reference_arg() -> Arg {
    Arg::new("reference")
        .long("reference")
        .value_name("REF")
        .help("Git branch or reference to use")
}

fn private_key_arg() -> Arg {
    Arg::new("private-key-file")
        .long("private-key-file")
        .value_name("FILE")
        .value_parser(clap::value_parser!(PathBuf))
        .help("SSH private key used to authenticate to the repository")
}

fn repository_arg() -> Arg {
    Arg::new("repository")
        .long("repository")
        .value_name("URL|@NAME")
        .help("Git repository URL or @name of a configured repository")
}

fn path_arg(help: &'static str) -> Arg {
    Arg::new("path")
        .long("path")
        .value_name("DIR")
        .value_parser(clap::value_parser!(PathBuf))
        .help(help)
}

fn message_arg() -> Arg {
    Arg::new("message")
        .long("message")
        .short('m')
        .value_name("TEXT")
        .help("Commit message")
}

impl Common {
    /// clap arguments for the common bundle of `verb`.
    pub fn args(verb: Verb) -> Vec<Arg> {
        match verb {
            Verb::Copy => vec![
                Arg::new("from")
                    .long("from")
                    .value_name("PROFILE")
                    .required(true)
                    .help("Profile to copy the resource from"),
                Arg::new("to")
                    .long("to")
                    .value_name("PROFILE")
                    .required(true)
                    .help("Profile to copy the resource to"),
                replace_arg(),
            ],
            Verb::Import => vec![
                replace_arg(),
                repository_arg(),
                reference_arg(),
                private_key_arg(),
            ],
            Verb::Export => vec![
                path_arg("Directory to write the exported file to"),
                repository_arg(),
                reference_arg(),
                private_key_arg(),
                message_arg(),
            ],
            Verb::Push => vec![
                path_arg("Directory inside the repository"),
                reference_arg(),
                private_key_arg(),
                message_arg(),
            ],
            Verb::Pull => vec![replace_arg(), reference_arg(), private_key_arg()],
            Verb::Dump => vec![path_arg("Directory to write exported files to")],
            Verb::Load => vec![replace_arg()],
            _ => Vec::new(),
        }
    }

    /// Reads the common bundle of `verb` out of parsed matches.
    pub fn from_matches(verb: Verb, m: &ArgMatches) -> Common {
        let string = |id: &str| m.get_one::<String>(id).cloned();
        let path = |id: &str| m.get_one::<PathBuf>(id).cloned();

        match verb {
            Verb::Copy => Common::Copy(CopyCommon {
                from: string("from").unwrap_or_default(),
                to: string("to").unwrap_or_default(),
                replace: m.get_flag("replace"),
            }),
            Verb::Import => Common::Import(ImportCommon {
                replace: m.get_flag("replace"),
                git: GitFlags {
                    repository: string("repository"),
                    reference: string("reference"),
                    private_key_file: path("private-key-file"),
                },
            }),
            Verb::Export => Common::Export(ExportCommon {
                path: path("path"),
                git: GitFlags {
                    repository: string("repository"),
                    reference: string("reference"),
                    private_key_file: path("private-key-file"),
                },
                message: string("message"),
            }),
            Verb::Push => Common::Push(PushCommon {
                path: path("path"),
                reference: string("reference"),
                private_key_file: path("private-key-file"),
                message: string("message"),
            }),
            Verb::Pull => Common::Pull(PullCommon {
                replace: m.get_flag("replace"),
                reference: string("reference"),
                private_key_file: path("private-key-file"),
            }),
            Verb::Dump => Common::Dump(DumpCommon { path: path("path") }),
            Verb::Load => Common::Load(LoadCommon {
                replace: m.get_flag("replace"),
            }),
            _ => Common::None,
        }
    }

    /// Whether `--replace` was given, for the verbs that accept it.
    pub fn replace(&self) -> bool {
        match self {
            Common::Copy(c) => c.replace,
            Common::Import(c) => c.replace,
            Common::Pull(c) => c.replace,
            Common::Load(c) => c.replace,
            _ => false,
        }
    }
}

/// `get` options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Only show resources whose name contains this text.
    pub filter: Option<String>,
}

/// `create` options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateOptions {
    pub description: Option<String>,
    /// Extra fields merged into the request body.
    pub properties: Option<serde_json::Map<String, Value>>,
}

/// Project import / export / copy options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectOptions {
    pub members: Vec<MemberSpec>,
    pub expand: bool,
}

/// Runner-specific flag bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Options {
    #[default]
    None,
    List(ListOptions),
    Create(CreateOptions),
    Project(ProjectOptions),
}

impl Options {
    pub fn project(&self) -> Option<&ProjectOptions> {
        match self {
            Options::Project(p) => Some(p),
            _ => None,
        }
    }

    pub fn expand(&self) -> bool {
        self.project().is_some_and(|p| p.expand)
    }
}

/// Declares and parses runner-specific flags for one verb.
pub trait Flagger: Send + Sync {
    fn args(&self) -> Vec<Arg>;
    fn parse(&self, m: &ArgMatches) -> Result<Options>;
}

/// `--filter` on `get`.
pub struct ListFlags;

impl Flagger for ListFlags {
    fn args(&self) -> Vec<Arg> {
        vec![Arg::new("filter")
            .long("filter")
            .value_name("TEXT")
            .help("Only show resources whose name contains TEXT")]
    }

    fn parse(&self, m: &ArgMatches) -> Result<Options> {
        Ok(Options::List(ListOptions {
            filter: m.get_one::<String>("filter").cloned(),
        }))
    }
}

/// `--description` / `--properties` on `create`.
pub struct CreateFlags;

impl Flagger for CreateFlags {
    fn args(&self) -> Vec<Arg> {
        vec![
            Arg::new("description")
                .long("description")
                .short('d')
                .value_name("TEXT")
                .help("Short description of the new resource"),
            Arg::new("properties")
                .long("properties")
                .value_name("JSON")
                .help("JSON object of additional fields for the new resource"),
        ]
    }

    fn parse(&self, m: &ArgMatches) -> Result<Options> {
        let properties = match m.get_one::<String>("properties") {
            None => None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => {
                    return Err(
                        Error::Validation("--properties must be a JSON object".into()).into(),
                    )
                }
            },
        };
        Ok(Options::Create(CreateOptions {
            description: m.get_one::<String>("description").cloned(),
            properties,
        }))
    }
}

/// `--member` / `--expand` for project transfers.
pub struct ProjectFlags {
    pub members: bool,
    pub expand: bool,
}

impl Flagger for ProjectFlags {
    fn args(&self) -> Vec<Arg> {
        let mut args = Vec::new();
        if self.members {
            args.push(
                Arg::new("member")
                    .long("member")
                    .value_name("SPEC")
                    .action(ArgAction::Append)
                    .help("Add a member: type=account|group,name=NAME[,access=owner|editor|operator|viewer]"),
            );
        }
        if self.expand {
            args.push(
                Arg::new("expand")
                    .long("expand")
                    .action(ArgAction::SetTrue)
                    .help("Store each project component in its own file"),
            );
        }
        args
    }

    fn parse(&self, m: &ArgMatches) -> Result<Options> {
        let members = if self.members {
            m.get_many::<String>("member")
                .into_iter()
                .flatten()
                .map(|spec| spec.parse::<MemberSpec>())
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(Options::Project(ProjectOptions {
            members,
            expand: self.expand && m.get_flag("expand"),
        }))
    }
}

/// Per-runner mapping from verb to its optional [`Flagger`].
#[derive(Clone, Default)]
pub struct HandlerFlags {
    flags: BTreeMap<Verb, Arc<dyn Flagger>>,
}

impl HandlerFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, verb: Verb, flagger: impl Flagger + 'static) -> Self {
        self.flags.insert(verb, Arc::new(flagger));
        self
    }

    pub fn get(&self, verb: Verb) -> Option<Arc<dyn Flagger>> {
        self.flags.get(&verb).cloned()
    }
}

impl fmt::Debug for HandlerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.flags.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    fn parse_with(args: Vec<Arg>, argv: &[&str]) -> ArgMatches {
        Command::new("t")
            .args(args)
            .try_get_matches_from(argv)
            .unwrap()
    }

    #[test]
    fn copy_common_requires_from_and_to() {
        let cmd = Command::new("t").args(Common::args(Verb::Copy));
        assert!(cmd.try_get_matches_from(["t", "--from", "a"]).is_err());

        let m = parse_with(Common::args(Verb::Copy), &["t", "--from", "a", "--to", "b", "--replace"]);
        assert_eq!(
            Common::from_matches(Verb::Copy, &m),
            Common::Copy(CopyCommon {
                from: "a".into(),
                to: "b".into(),
                replace: true
            })
        );
    }

    #[test]
    fn export_common_reads_git_flags() {
        let m = parse_with(
            Common::args(Verb::Export),
            &["t", "--path", "out", "--repository", "@myrepo", "--reference", "dev", "-m", "hi"],
        );
        let Common::Export(e) = Common::from_matches(Verb::Export, &m) else {
            panic!("expected export bundle");
        };
        assert_eq!(e.path, Some(PathBuf::from("out")));
        assert_eq!(e.git.repository.as_deref(), Some("@myrepo"));
        assert_eq!(e.git.reference.as_deref(), Some("dev"));
        assert_eq!(e.message.as_deref(), Some("hi"));
    }

    #[test]
    fn verbs_without_bundle_get_none() {
        assert!(Common::args(Verb::Get).is_empty());
        let m = parse_with(vec![], &["t"]);
        assert_eq!(Common::from_matches(Verb::Get, &m), Common::None);
    }

    #[test]
    fn create_flags_reject_non_object_properties() {
        let m = parse_with(CreateFlags.args(), &["t", "--properties", "[1,2]"]);
        assert!(CreateFlags.parse(&m).is_err());

        let m = parse_with(
            CreateFlags.args(),
            &["t", "-d", "demo", "--properties", r#"{"model":"x"}"#],
        );
        let Options::Create(opts) = CreateFlags.parse(&m).unwrap() else {
            panic!("expected create options");
        };
        assert_eq!(opts.description.as_deref(), Some("demo"));
        assert_eq!(opts.properties.unwrap()["model"], "x");
    }

    #[test]
    fn project_flags_parse_members() {
        let flagger = ProjectFlags {
            members: true,
            expand: true,
        };
        let m = parse_with(
            flagger.args(),
            &[
                "t",
                "--member",
                "type=account,name=alice,access=editor",
                "--member",
                "type=group,name=devops",
                "--expand",
            ],
        );
        let opts = flagger.parse(&m).unwrap();
        let project = opts.project().unwrap();
        assert_eq!(project.members.len(), 2);
        assert!(opts.expand());

        let m = parse_with(flagger.args(), &["t", "--member", "type=user,name=alice"]);
        let err = flagger.parse(&m).unwrap_err();
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn handler_flags_lookup() {
        let flags = HandlerFlags::new().with(Verb::Create, CreateFlags);
        assert!(flags.get(Verb::Create).is_some());
        assert!(flags.get(Verb::Get).is_none());
    }

    #[test]
    fn git_flags_apply_overrides() {
        let cfg = Config::minimal();
        let flags = GitFlags {
            repository: Some("git@host:org/repo.git".into()),
            reference: Some("dev".into()),
            private_key_file: Some(PathBuf::from("/keys/id")),
        };
        let repo = flags.resolve(&cfg).unwrap().unwrap();
        assert_eq!(repo.reference, "dev");
        assert_eq!(repo.private_key_file, Some(PathBuf::from("/keys/id")));
        assert!(GitFlags::default().resolve(&cfg).unwrap().is_none());
    }
}

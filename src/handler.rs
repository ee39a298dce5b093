//! Command tree built from the registry and the descriptor catalog.
//!
//! Every verb is a synthetic parent command. Its children are produced by
//! walking the runners that declare the verb's capability and keeping
//! those with a non-disabled descriptor for `(resource, verb)`:
//!
//! ```text
//! ipctl get workflows            -> Reader::get     on "workflows"
//! ipctl export project Acme      -> Exporter::export on "projects"
//! ipctl push role MyRole @repo   -> Gitter::push    on "roles"
//! ```
//!
//! The tree is built before argument parsing and does not need the
//! configuration. The [`Runtime`] is handed to the selected
//! [`CommandRunner`] at execution time.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::descriptors::{group_rank, group_title, Descriptor, Descriptors};
use crate::error::Error;
use crate::flags::{Common, Flagger, Options};
use crate::registry::Registry;
use crate::render::Renderer;
use crate::runner::{dispatch, Request, Response, Runner, Verb};
use crate::runtime::Runtime;

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GlobalArgs {
    /// Server profile to run against.
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Path to the configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log requests and Git operations to stderr.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output format: human, json or yaml.
    #[arg(long, short = 'o', global = true, value_name = "FORMAT")]
    pub output: Option<String>,
}

/// One emitted `<verb> <noun>` command and everything needed to run it.
pub struct CommandRunner {
    pub key: Verb,
    pub resource: String,
    pub descriptor: Descriptor,
    pub runner: Arc<dyn Runner>,
    pub options: Option<Arc<dyn Flagger>>,
}

impl CommandRunner {
    /// Subcommand name under the verb parent, e.g. `workflow`.
    pub fn name(&self) -> &str {
        self.descriptor.command_name()
    }

    /// Group ID the command is listed under.
    pub fn group(&self) -> &str {
        &self.descriptor.group
    }

    fn command(&self) -> Command {
        let d = &self.descriptor;
        let mut cmd = Command::new(self.name().to_string())
            .about(d.short.clone())
            .hide(d.hidden);
        if !d.long.is_empty() {
            cmd = cmd.long_about(d.long.clone());
        }
        if !d.example.is_empty() {
            let example = d
                .example
                .lines()
                .map(|l| format!("  {}", l))
                .collect::<Vec<_>>()
                .join("\n");
            cmd = cmd.after_help(format!("Examples:\n{}", example));
        }

        let names = d.arg_names();
        let mut args = Arg::new("args").action(ArgAction::Append);
        if d.exact_args > 0 {
            args = args.num_args(d.exact_args).required(true);
            if names.len() == d.exact_args {
                args = args.value_names(names);
            } else {
                args = args.value_name("ARG");
            }
        } else {
            args = args.num_args(0..).value_name("ARG");
        }
        cmd = cmd.arg(args).args(Common::args(self.key));
        if let Some(flagger) = &self.options {
            cmd = cmd.args(flagger.args());
        }
        cmd
    }

    /// Builds the request from parsed matches and calls the bound runner
    /// method.
    pub async fn run(&self, m: &ArgMatches, runtime: Arc<Runtime>) -> Result<Response> {
        let args = m
            .get_many::<String>("args")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let options = match &self.options {
            Some(flagger) => flagger.parse(m)?,
            None => Options::None,
        };
        let req = Request {
            args,
            common: Common::from_matches(self.key, m),
            options,
            runtime,
            runner: Arc::clone(&self.runner),
        };
        debug!(verb = %self.key, resource = %self.resource, request = ?req, "dispatch");
        dispatch(self.key, self.runner.as_ref(), &req).await
    }
}

pub struct CommandTree {
    root: Command,
    runners: BTreeMap<(Verb, String), CommandRunner>,
}

fn root_command() -> Command {
    let root = Command::new("ipctl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manage an automation platform server from the command line")
        .long_about(
            "ipctl runs verb-over-noun commands (get, describe, import, export, push, ...) \
             against a configured server profile and renders the result as a table, JSON or YAML.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true);
    GlobalArgs::augment_args(root)
}

/// Visible children listed under their group titles, in sorted order.
fn group_listing(children: &[CommandRunner]) -> Option<String> {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for child in children.iter().filter(|c| !c.descriptor.hidden) {
        if current != Some(child.group()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}:\n", group_title(child.group())));
            current = Some(child.group());
        }
        out.push_str(&format!("  {:<20} {}\n", child.name(), child.descriptor.short));
    }
    (!out.is_empty()).then(|| out.trim_end().to_string())
}

/// Builds the full command tree.
pub fn build(registry: &Registry, descriptors: &Descriptors) -> CommandTree {
    let mut root = root_command();
    let mut runners = BTreeMap::new();

    for verb in Verb::ALL {
        let mut children: Vec<CommandRunner> = registry
            .with_capability(verb.capability())
            .into_iter()
            .filter_map(|runner| {
                let descriptor = descriptors.get(runner.name(), verb.as_str())?;
                if descriptor.disabled {
                    return None;
                }
                Some(CommandRunner {
                    key: verb,
                    resource: runner.name().to_string(),
                    descriptor: descriptor.clone(),
                    options: runner.flags().get(verb),
                    runner,
                })
            })
            .collect();
        if children.is_empty() {
            continue;
        }
        children.sort_by(|a, b| {
            (group_rank(a.group()), a.name()).cmp(&(group_rank(b.group()), b.name()))
        });

        let mut parent = Command::new(verb.as_str())
            .about(verb.about())
            .subcommand_required(true)
            .arg_required_else_help(true);
        if let Some(listing) = group_listing(&children) {
            parent = parent.after_help(listing);
        }
        for (order, child) in children.into_iter().enumerate() {
            parent = parent.subcommand(child.command().display_order(order));
            runners.insert((verb, child.name().to_string()), child);
        }
        root = root.subcommand(parent);
    }

    CommandTree {
        root: root.subcommand(crate::api::command()),
        runners,
    }
}

impl CommandTree {
    /// The clap command to parse argv with.
    pub fn command(&self) -> Command {
        self.root.clone()
    }

    pub fn runner(&self, verb: Verb, name: &str) -> Option<&CommandRunner> {
        self.runners.get(&(verb, name.to_string()))
    }

    pub fn runners(&self) -> impl Iterator<Item = &CommandRunner> {
        self.runners.values()
    }

    /// Reads the global flags out of parsed matches.
    pub fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
        Ok(GlobalArgs::from_arg_matches(matches)?)
    }

    /// Runs the selected command and renders its response on stdout.
    ///
    /// The renderer is constructed before the runner is called, so an
    /// unknown output format fails before anything is sent to the server.
    pub async fn execute(&self, matches: &ArgMatches, runtime: Arc<Runtime>) -> Result<()> {
        let renderer = Renderer::new(&runtime.output, runtime.config.pager)?;
        let response = self.respond(matches, runtime).await?;
        renderer.render(&response)
    }

    /// Runs the selected command and returns its response unrendered.
    pub async fn respond(&self, matches: &ArgMatches, runtime: Arc<Runtime>) -> Result<Response> {
        let (verb_name, verb_matches) = matches
            .subcommand()
            .ok_or_else(|| Error::Validation("no command given".into()))?;
        if verb_name == "api" {
            return crate::api::execute(verb_matches, runtime).await;
        }

        let verb: Verb = verb_name.parse()?;
        let (noun, noun_matches) = verb_matches
            .subcommand()
            .ok_or_else(|| Error::Validation(format!("{} requires a resource", verb)))?;
        let runner = self.runner(verb, noun).ok_or_else(|| Error::NotImplemented {
            verb: verb.to_string(),
            resource: noun.to_string(),
        })?;
        runner.run(noun_matches, runtime).await
    }
}

//! Layered configuration: hard-coded defaults → config file → environment → flags.
//!
//! The file is INI-flavored (see [`crate::ini`]):
//!
//! ```ini
//! [application]
//! default_profile = prod
//! default_output = human
//!
//! [profile default]
//! username = admin
//!
//! [profile prod]
//! host = h.example
//! port = 8443
//!
//! [repository myrepo]
//! url = git@host:org/repo.git
//! reference = main
//! private_key_file = ~/.ssh/id_ed25519
//! ```
//!
//! Profiles resolve field by field: `IPCTL_PROFILE_<NAME>_<FIELD>` beats the
//! profile's own section, which beats `[profile default]`, which beats the
//! built-in defaults. Named repositories follow the same order without the
//! `default` fallback. The resolved [`Config`] is immutable and shared by
//! reference for the rest of the process.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::ini::{self, Document, Section};

/// Prefix for every environment variable read by `ipctl`.
pub const ENV_PREFIX: &str = "IPCTL";

/// Name of the profile that always exists and backs every other profile.
pub const DEFAULT_PROFILE: &str = "default";

const DEFAULT_CONFIG_PATH: &str = "~/.platform.d/config";
const DEFAULT_WORKING_DIR: &str = "~/.platform.d";
const DEFAULT_REFERENCE: &str = "main";

const PROFILE_FIELDS: &[&str] = &[
    "host",
    "port",
    "use_tls",
    "verify",
    "username",
    "password",
    "client_id",
    "client_secret",
    "mongo_url",
    "timeout",
];

const REPOSITORY_FIELDS: &[&str] = &[
    "url",
    "private_key",
    "private_key_file",
    "reference",
    "name",
    "email",
];

/// A named server connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub host: String,
    /// `0` selects the protocol default.
    pub port: u16,
    pub use_tls: bool,
    pub verify: bool,
    pub username: String,
    pub password: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub mongo_url: Option<String>,
    /// Request deadline in seconds, `0` means none.
    pub timeout: u64,
}

impl Profile {
    fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: "localhost".to_string(),
            port: 0,
            use_tls: true,
            verify: true,
            username: "admin".to_string(),
            password: "admin".to_string(),
            client_id: None,
            client_secret: None,
            mongo_url: None,
            timeout: 0,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> std::result::Result<(), String> {
        let opt = |v: &str| (!v.is_empty()).then(|| v.to_string());
        match field {
            "host" => self.host = value.to_string(),
            "port" => self.port = parse_int(field, value)?,
            "use_tls" => self.use_tls = parse_bool(field, value)?,
            "verify" => self.verify = parse_bool(field, value)?,
            "username" => self.username = value.to_string(),
            "password" => self.password = value.to_string(),
            "client_id" => self.client_id = opt(value),
            "client_secret" => self.client_secret = opt(value),
            "mongo_url" => self.mongo_url = opt(value),
            "timeout" => self.timeout = parse_int(field, value)?,
            // Unknown keys in a profile section are tolerated.
            _ => {}
        }
        Ok(())
    }

    /// Base URL for API requests, e.g. `https://h.example:8443`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        if self.port == 0 {
            format!("{}://{}", scheme, self.host)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// A named Git endpoint used by `--repository @name`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Repository {
    pub url: String,
    pub private_key: Option<String>,
    pub private_key_file: Option<PathBuf>,
    pub reference: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Repository {
    /// A repository given as a bare URL on the command line.
    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            reference: DEFAULT_REFERENCE.to_string(),
            ..Default::default()
        }
    }

    fn set(&mut self, field: &str, value: &str) {
        let opt = |v: &str| (!v.is_empty()).then(|| v.to_string());
        match field {
            "url" => self.url = value.to_string(),
            "private_key" => self.private_key = opt(value),
            "private_key_file" => self.private_key_file = opt(value).map(|v| expand_tilde(Path::new(&v))),
            "reference" => self.reference = value.to_string(),
            "name" => self.name = opt(value),
            "email" => self.email = opt(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
    pub file_json: bool,
    pub console_json: bool,
    pub file_enabled: bool,
    pub timestamp_timezone: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_json: false,
            console_json: false,
            file_enabled: false,
            timestamp_timezone: "utc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConfig {
    pub no_color: bool,
    pub timestamp_timezone: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            timestamp_timezone: "utc".to_string(),
        }
    }
}

/// Commit identity fallback used when a repository does not set its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GitConfig {
    pub name: Option<String>,
    pub email: Option<String>,
    pub user: Option<String>,
}

/// Process-wide resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if any.
    pub path: Option<PathBuf>,
    pub working_dir: PathBuf,
    pub default_profile: String,
    pub default_output: String,
    pub pager: bool,
    pub log: LogConfig,
    pub terminal: TerminalConfig,
    pub mongo_uri: Option<String>,
    pub git: GitConfig,
    /// Name of the profile commands run against unless told otherwise.
    pub active_profile: String,
    pub profiles: BTreeMap<String, Profile>,
    pub repositories: BTreeMap<String, Repository>,
}

/// Snapshot of the `IPCTL_*` environment.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    pub fn from_process() -> Self {
        let prefix = format!("{}_", ENV_PREFIX);
        Self {
            vars: std::env::vars()
                .filter(|(k, _)| k.starts_with(&prefix))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.vars
            .keys()
            .filter(move |k| k.starts_with(prefix))
            .map(String::as_str)
    }
}

/// Command-line inputs that take part in resolution.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub profile: Option<String>,
}

impl Config {
    /// Pure defaults, as if no file and no environment were present.
    pub fn minimal() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            DEFAULT_PROFILE.to_string(),
            Profile::with_defaults(DEFAULT_PROFILE),
        );
        Self {
            path: None,
            working_dir: expand_tilde(Path::new(DEFAULT_WORKING_DIR)),
            default_profile: DEFAULT_PROFILE.to_string(),
            default_output: "human".to_string(),
            pager: false,
            log: LogConfig::default(),
            terminal: TerminalConfig::default(),
            mongo_uri: None,
            git: GitConfig::default(),
            active_profile: DEFAULT_PROFILE.to_string(),
            profiles,
            repositories: BTreeMap::new(),
        }
    }

    /// Looks up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()).into())
    }

    /// The profile selected by `--profile`, `IPCTL_PROFILE`, or
    /// `application.default_profile`.
    pub fn active(&self) -> Result<&Profile> {
        self.profile(&self.active_profile)
    }

    pub fn repository(&self, name: &str) -> Result<&Repository> {
        self.repositories
            .get(name)
            .ok_or_else(|| Error::RepositoryNotFound(name.to_string()).into())
    }

    /// Resolves a URL-like flag value: `@name` selects a configured
    /// repository, anything else is treated as a bare URL.
    pub fn resolve_repository(&self, token: &str) -> Result<Repository> {
        match token.strip_prefix('@') {
            Some(name) => self.repository(name).cloned(),
            None => Ok(Repository::from_url(token)),
        }
    }

    /// Author and committer identity for commits made to `repo`.
    pub fn commit_identity(&self, repo: &Repository) -> (String, String) {
        let user = self
            .git
            .user
            .clone()
            .unwrap_or_else(current_os_user);
        let name = repo
            .name
            .clone()
            .or_else(|| self.git.name.clone())
            .unwrap_or_else(|| user.clone());
        let email = repo
            .email
            .clone()
            .or_else(|| self.git.email.clone())
            .unwrap_or_else(|| format!("{}@users.{}", user, ENV_PREFIX.to_lowercase()));
        (name, email)
    }
}

/// Loads the configuration file and applies environment and flag overrides.
///
/// File selection: `overrides.config_path` → `IPCTL_CONFIG` →
/// `IPCTL_CONFIG_FILE` → `~/.platform.d/config`. An explicitly named file
/// must exist; the implicit default may be absent.
pub fn load_config(overrides: &Overrides, env: &Env) -> Result<Config> {
    let explicit = overrides
        .config_path
        .clone()
        .or_else(|| env.get(&format!("{}_CONFIG", ENV_PREFIX)).map(PathBuf::from))
        .or_else(|| env.get(&format!("{}_CONFIG_FILE", ENV_PREFIX)).map(PathBuf::from));

    let (path, doc) = match explicit {
        Some(path) => {
            let path = expand_tilde(&path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            (Some(path), parse_document(&content)?)
        }
        None => {
            let path = expand_tilde(Path::new(DEFAULT_CONFIG_PATH));
            if path.is_file() {
                let content = std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read config file: {}", path.display())
                })?;
                (Some(path), parse_document(&content)?)
            } else {
                (None, Document::default())
            }
        }
    };

    resolve(path, &doc, env, overrides)
}

/// Resolves configuration from already-loaded file content.
pub fn load_config_str(content: &str, env: &Env, overrides: &Overrides) -> Result<Config> {
    let doc = parse_document(content)?;
    resolve(None, &doc, env, overrides)
}

fn parse_document(content: &str) -> Result<Document> {
    ini::parse(content).map_err(|e| Error::ConfigLoad(e.to_string()).into())
}

/// Reads `[section] key`, letting `IPCTL_<SECTION>_<KEY>` win.
struct Settings<'a> {
    doc: &'a Document,
    env: &'a Env,
}

impl Settings<'_> {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let env_key = format!(
            "{}_{}_{}",
            ENV_PREFIX,
            section.to_uppercase(),
            key.to_uppercase()
        );
        self.env
            .get(&env_key)
            .map(str::to_string)
            .or_else(|| {
                self.doc
                    .section(section)
                    .and_then(|s| s.get(key))
                    .map(str::to_string)
            })
    }

    fn string(&self, section: &str, key: &str, default: &str) -> String {
        self.get(section, key).unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, section: &str, key: &str, default: bool) -> Result<bool> {
        match self.get(section, key) {
            Some(v) => parse_bool(&format!("{}.{}", section, key), &v)
                .map_err(|e| Error::ConfigLoad(e).into()),
            None => Ok(default),
        }
    }
}

fn resolve(
    path: Option<PathBuf>,
    doc: &Document,
    env: &Env,
    overrides: &Overrides,
) -> Result<Config> {
    let settings = Settings { doc, env };

    let working_dir = expand_tilde(Path::new(&settings.string(
        "application",
        "working_dir",
        DEFAULT_WORKING_DIR,
    )));
    let default_profile = settings.string("application", "default_profile", DEFAULT_PROFILE);
    let default_output = settings.string("application", "default_output", "human");
    let pager = settings.bool("application", "pager", false)?;

    let log = LogConfig {
        level: settings.string("log", "level", "info"),
        file_json: settings.bool("log", "file_json", false)?,
        console_json: settings.bool("log", "console_json", false)?,
        file_enabled: settings.bool("log", "file_enabled", false)?,
        timestamp_timezone: settings.string("log", "timestamp_timezone", "utc"),
    };
    let terminal = TerminalConfig {
        no_color: settings.bool("terminal", "no_color", false)?,
        timestamp_timezone: settings.string("terminal", "timestamp_timezone", "utc"),
    };
    let git = GitConfig {
        name: settings.get("git", "name"),
        email: settings.get("git", "email"),
        user: settings.get("git", "user"),
    };

    let profiles = resolve_profiles(doc, env)?;
    let repositories = resolve_repositories(doc, env)?;

    let active_profile = overrides
        .profile
        .clone()
        .or_else(|| env.get(&format!("{}_PROFILE", ENV_PREFIX)).map(str::to_string))
        .unwrap_or_else(|| default_profile.clone());

    Ok(Config {
        path,
        working_dir,
        default_profile,
        default_output,
        pager,
        log,
        terminal,
        mongo_uri: settings.get("mongo", "uri"),
        git,
        active_profile,
        profiles,
        repositories,
    })
}

fn resolve_profiles(doc: &Document, env: &Env) -> Result<BTreeMap<String, Profile>> {
    let mut names: Vec<String> = doc
        .named("profile")
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    names.push(DEFAULT_PROFILE.to_string());
    let names = merge_entity_names(
        names,
        discover_env_entities(env, "PROFILE", PROFILE_FIELDS)?,
    );

    let default_section = doc.section(&format!("profile {}", DEFAULT_PROFILE));

    let mut profiles = BTreeMap::new();
    for name in names {
        let mut profile = Profile::with_defaults(&name);
        let own = doc.section(&format!("profile {}", name));

        for field in PROFILE_FIELDS {
            let value = env_value(env, "PROFILE", &name, field)
                .or_else(|| own.and_then(|s| s.get(field)).map(str::to_string))
                .or_else(|| default_section.and_then(|s| s.get(field)).map(str::to_string));
            if let Some(value) = value {
                profile.set(field, &value).map_err(|e| {
                    Error::ConfigLoad(format!("profile '{}': {}", name, e))
                })?;
            }
        }

        if profile.host.is_empty() {
            return Err(Error::ConfigLoad(format!("profile '{}': host must not be empty", name)).into());
        }
        profiles.insert(name, profile);
    }
    Ok(profiles)
}

fn resolve_repositories(doc: &Document, env: &Env) -> Result<BTreeMap<String, Repository>> {
    let names: Vec<String> = doc
        .named("repository")
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    let names = merge_entity_names(
        names,
        discover_env_entities(env, "REPOSITORY", REPOSITORY_FIELDS)?,
    );

    let mut repositories = BTreeMap::new();
    for name in names {
        let own: Option<&Section> = doc.section(&format!("repository {}", name));
        let mut repo = Repository {
            reference: DEFAULT_REFERENCE.to_string(),
            ..Default::default()
        };
        for field in REPOSITORY_FIELDS {
            let value = env_value(env, "REPOSITORY", &name, field)
                .or_else(|| own.and_then(|s| s.get(field)).map(str::to_string));
            if let Some(value) = value {
                repo.set(field, &value);
            }
        }
        if repo.private_key.is_some() && repo.private_key_file.is_some() {
            return Err(Error::ConfigLoad(format!(
                "repository '{}': only one of private_key or private_key_file may be set",
                name
            ))
            .into());
        }
        repositories.insert(name, repo);
    }
    Ok(repositories)
}

/// Environment spelling of an entity name: uppercase, `-` → `_`.
fn env_name(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

/// Entity names from the file, plus environment-only ones. Names that map
/// to the same variable name are one entity; the file spelling wins.
fn merge_entity_names(file: Vec<String>, from_env: Vec<String>) -> Vec<String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for name in file.into_iter().chain(from_env) {
        merged.entry(env_name(&name)).or_insert(name);
    }
    merged.into_values().collect()
}

fn env_value(env: &Env, kind: &str, name: &str, field: &str) -> Option<String> {
    let key = format!(
        "{}_{}_{}_{}",
        ENV_PREFIX,
        kind,
        env_name(name),
        field.to_uppercase()
    );
    env.get(&key).map(str::to_string)
}

/// Finds entity names that exist only as `IPCTL_<KIND>_<NAME>_<FIELD>`
/// variables. Fields are matched longest first so `PRIVATE_KEY_FILE` is not
/// mistaken for `PRIVATE_KEY`.
fn discover_env_entities(env: &Env, kind: &str, fields: &[&str]) -> Result<Vec<String>> {
    let prefix = format!("{}_{}_", ENV_PREFIX, kind);
    let mut suffixes: Vec<String> = fields
        .iter()
        .map(|f| format!("_{}", f.to_uppercase()))
        .collect();
    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut names = Vec::new();
    for key in env.keys_with_prefix(&prefix) {
        let rest = &key[prefix.len()..];
        if let Some(suffix) = suffixes.iter().find(|s| rest.ends_with(s.as_str())) {
            let name = &rest[..rest.len() - suffix.len()];
            if name.is_empty() {
                continue;
            }
            names.push(name.to_lowercase());
        }
    }
    Ok(names)
}

fn parse_bool(field: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("{}: expected true or false, got '{}'", field, other)),
    }
}

fn parse_int<T: std::str::FromStr>(field: &str, value: &str) -> std::result::Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("{}: expected an integer, got '{}'", field, value))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/") || s == "~" {
        if let Some(home) = home_dir() {
            return home.join(s.strip_prefix("~/").unwrap_or(""));
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn current_os_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| ENV_PREFIX.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str, env: &[(&str, &str)]) -> Result<Config> {
        load_config_str(content, &Env::from_pairs(env.iter().copied()), &Overrides::default())
    }

    #[test]
    fn defaults_without_file() {
        let cfg = Config::minimal();
        let p = cfg.active().unwrap();
        assert_eq!(p.name, "default");
        assert_eq!(p.host, "localhost");
        assert!(p.use_tls);
        assert!(p.verify);
        assert_eq!(p.username, "admin");
        assert_eq!(p.password, "admin");
        assert_eq!(p.timeout, 0);
        assert_eq!(cfg.default_output, "human");
    }

    #[test]
    fn profile_inherits_from_default_field_by_field() {
        let cfg = load(
            "[profile default]\nusername = ops\nport = 3000\n\n[profile prod]\nhost = h.example\nport = 8443\n",
            &[],
        )
        .unwrap();
        let prod = cfg.profile("prod").unwrap();
        assert_eq!(prod.host, "h.example");
        assert_eq!(prod.port, 8443);
        assert_eq!(prod.username, "ops");
        assert_eq!(prod.password, "admin");
    }

    #[test]
    fn environment_beats_file() {
        let cfg = load(
            "[profile prod]\nhost = h.example\n",
            &[("IPCTL_PROFILE_PROD_HOST", "env.example")],
        )
        .unwrap();
        assert_eq!(cfg.profile("prod").unwrap().host, "env.example");
    }

    #[test]
    fn env_only_profiles_are_discovered() {
        let cfg = load(
            "",
            &[
                ("IPCTL_PROFILE_STAGING_HOST", "stage.example"),
                ("IPCTL_PROFILE_STAGING_CLIENT_ID", "abc"),
            ],
        )
        .unwrap();
        let staging = cfg.profile("staging").unwrap();
        assert_eq!(staging.host, "stage.example");
        assert_eq!(staging.client_id.as_deref(), Some("abc"));
    }

    #[test]
    fn env_overrides_merge_into_mixed_case_sections() {
        let cfg = load(
            "[profile Prod]\nhost = h.example\n\n[repository Assets]\nurl = git@example.com:a.git\n",
            &[
                ("IPCTL_PROFILE_PROD_PORT", "9000"),
                ("IPCTL_REPOSITORY_ASSETS_REFERENCE", "release"),
            ],
        )
        .unwrap();
        let names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Prod", "default"]);
        let prod = cfg.profile("Prod").unwrap();
        assert_eq!(prod.host, "h.example");
        assert_eq!(prod.port, 9000);

        let repos: Vec<&str> = cfg.repositories.keys().map(String::as_str).collect();
        assert_eq!(repos, vec!["Assets"]);
        assert_eq!(cfg.repositories["Assets"].reference, "release");
    }

    #[test]
    fn bad_bool_is_fatal() {
        let err = load("[profile prod]\nuse_tls = yes\n", &[]).unwrap_err();
        assert!(err.to_string().contains("expected true or false"));
    }

    #[test]
    fn bad_int_is_fatal() {
        assert!(load("[profile prod]\nport = abc\n", &[]).is_err());
        assert!(load("", &[("IPCTL_PROFILE_DEFAULT_TIMEOUT", "soon")]).is_err());
    }

    #[test]
    fn active_profile_precedence() {
        let content = "[application]\ndefault_profile = prod\n[profile prod]\nhost = p\n[profile dev]\nhost = d\n";
        let cfg = load(content, &[]).unwrap();
        assert_eq!(cfg.active_profile, "prod");

        let cfg = load(content, &[("IPCTL_PROFILE", "dev")]).unwrap();
        assert_eq!(cfg.active_profile, "dev");

        let overrides = Overrides {
            profile: Some("default".into()),
            ..Default::default()
        };
        let cfg = load_config_str(
            content,
            &Env::from_pairs([("IPCTL_PROFILE", "dev")]),
            &overrides,
        )
        .unwrap();
        assert_eq!(cfg.active_profile, "default");
    }

    #[test]
    fn unknown_profile_fails_at_use_site() {
        let cfg = load("[application]\ndefault_profile = ghost\n", &[]).unwrap();
        let err = cfg.active().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ProfileNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn repositories_resolve_without_default_fallback() {
        let cfg = load(
            "[repository myrepo]\nurl = git@host:org/repo.git\nprivate_key_file = ~/.ssh/id\n",
            &[("IPCTL_REPOSITORY_MYREPO_REFERENCE", "release")],
        )
        .unwrap();
        let repo = cfg.resolve_repository("@myrepo").unwrap();
        assert_eq!(repo.url, "git@host:org/repo.git");
        assert_eq!(repo.reference, "release");
        let key = repo.private_key_file.unwrap();
        assert!(!key.to_string_lossy().starts_with('~'));
        assert!(key.ends_with(".ssh/id"));

        let bare = cfg.resolve_repository("https://example/repo.git").unwrap();
        assert_eq!(bare.url, "https://example/repo.git");
        assert_eq!(bare.reference, "main");

        assert!(cfg.resolve_repository("@missing").is_err());
    }

    #[test]
    fn both_private_keys_is_fatal() {
        let err = load(
            "[repository r]\nurl = x\nprivate_key = abc\nprivate_key_file = /k\n",
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn scalar_sections_and_env_overrides() {
        let cfg = load(
            "[log]\nlevel = warn\nfile_enabled = true\n[terminal]\nno_color = true\n[mongo]\nuri = mongodb://m\n",
            &[("IPCTL_LOG_LEVEL", "debug"), ("IPCTL_APPLICATION_PAGER", "true")],
        )
        .unwrap();
        assert_eq!(cfg.log.level, "debug");
        assert!(cfg.log.file_enabled);
        assert!(cfg.terminal.no_color);
        assert!(cfg.pager);
        assert_eq!(cfg.mongo_uri.as_deref(), Some("mongodb://m"));
    }

    #[test]
    fn commit_identity_falls_back() {
        let cfg = load("[git]\nname = Ops Bot\nuser = ops\n", &[]).unwrap();
        let repo = Repository::from_url("x");
        assert_eq!(
            cfg.commit_identity(&repo),
            ("Ops Bot".to_string(), "ops@users.ipctl".to_string())
        );

        let repo = Repository {
            name: Some("Alice".into()),
            email: Some("a@example.com".into()),
            ..Repository::from_url("x")
        };
        assert_eq!(
            cfg.commit_identity(&repo),
            ("Alice".to_string(), "a@example.com".to_string())
        );
    }

    #[test]
    fn base_url_honors_port_and_tls() {
        let mut p = Profile::with_defaults("x");
        p.host = "h.example".into();
        assert_eq!(p.base_url(), "https://h.example");
        p.port = 8443;
        assert_eq!(p.base_url(), "https://h.example:8443");
        p.use_tls = false;
        p.port = 0;
        assert_eq!(p.base_url(), "http://h.example");
    }
}

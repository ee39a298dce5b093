//! Error kinds surfaced by `ipctl` commands.
//!
//! Most functions in the crate return [`anyhow::Result`] and attach context
//! as errors bubble up. Where a caller needs to react to a *specific* kind
//! of failure (for example treating "not found" as "nothing to delete"
//! during a `--replace` import), the failure is raised as an [`Error`]
//! variant so it can be recovered with `downcast_ref::<Error>()`.
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | [`Error::ConfigLoad`] | malformed INI, bad types, whitespace in entity names |
//! | [`Error::ProfileNotFound`] | profile lookups at use site |
//! | [`Error::RepositoryNotFound`] | `@name` repository lookups |
//! | [`Error::NotFound`] | HTTP 404 or a named resource missing from a listing |
//! | [`Error::AlreadyExists`] | import / create / copy onto an existing resource |
//! | [`Error::Validation`] | member specs, method names, missing document fields |
//! | [`Error::Transport`] | timeouts, refused connections |
//! | [`Error::Server`] | any other non-2xx server response |
//! | [`Error::Git`] | clone / commit / push failures |
//! | [`Error::Decode`] | bytes that are neither JSON nor YAML |
//! | [`Error::NotImplemented`] | a capability advertised but not provided |

use thiserror::Error;

/// Typed failure kinds. See the module documentation for where each is raised.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    ConfigLoad(String),

    #[error("profile '{0}' does not exist")]
    ProfileNotFound(String),

    #[error("repository '{0}' does not exist")]
    RepositoryNotFound(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("git {op} failed: {message}")]
    Git { op: String, message: String },

    #[error("unable to decode {0} as JSON or YAML")]
    Decode(String),

    #[error("'{verb}' is not implemented for {resource}")]
    NotImplemented { verb: String, resource: String },

    #[error("render error: {0}")]
    Render(String),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn git(op: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Git {
            op: op.into(),
            message: message.into(),
        }
    }
}

/// Returns `true` when the error chain contains an [`Error::NotFound`].
///
/// The HTTP layer maps 404 responses onto this kind, so it also matches
/// "the server said 404".
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<Error>(),
            Some(Error::NotFound { .. }) | Some(Error::Server { status: 404, .. })
        )
    })
}

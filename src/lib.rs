//! # ipctl
//!
//! Command-line administration for automation-platform servers.
//!
//! `ipctl` exposes a verb-over-noun grammar (`get workflows`,
//! `export project Acme`, `push role MyRole @repo`, ...) over some thirty
//! server resource types. Each invocation resolves a server profile from the
//! local configuration, issues HTTP requests through a per-profile client,
//! and renders the result as a table, JSON or YAML.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │ descriptors│──▶│ handler  │──▶│  runners    │──▶│  client  │──▶ server
//! │ (YAML)     │   │ (clap)   │   │ (resources) │   └──────────┘
//! └────────────┘   └────┬─────┘   └──────┬──────┘
//!                       │                │ transfer / copy
//!       registry ───────┘                ▼
//!                                  ┌──────────┐
//!                                  │ git / fs │
//!                                  └──────────┘
//! ```
//!
//! Runners declare capability sets ([`runner::Reader`],
//! [`runner::Exporter`], ...). The [`registry`] groups them once at startup
//! and the [`handler`] builds one command per `(verb, resource)` pair that
//! has both a capability and an enabled descriptor.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | INI configuration, profiles and repositories |
//! | [`descriptors`] | Embedded per-resource command metadata |
//! | [`runner`] | Request / response and capability traits |
//! | [`registry`] | Runners grouped by capability |
//! | [`handler`] | Command tree and execution body |
//! | [`render`] | Human, JSON and YAML output |
//! | [`client`] | Per-profile HTTP client |
//! | [`transfer`] | Import / export / push / pull pipeline |
//! | [`git`] | Scoped Git checkouts |
//! | [`project`] | Expanded project layout and member specs |
//! | [`copy`] | Cross-server copy |
//! | [`resources`] | Resource runners |

pub mod api;
pub mod client;
pub mod config;
pub mod copy;
pub mod descriptors;
pub mod editor;
pub mod error;
pub mod flags;
pub mod git;
pub mod handler;
pub mod ini;
pub mod logging;
pub mod project;
pub mod registry;
pub mod render;
pub mod resources;
pub mod runner;
pub mod runtime;
pub mod transfer;

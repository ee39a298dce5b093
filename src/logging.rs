//! Tracing subscriber setup from the `[log]` and `[terminal]` settings.
//!
//! Successful commands stay silent on stderr: the console layer is only
//! installed with `--verbose`. The file layer appends to
//! `<working_dir>/ipctl.log` when `log.file_enabled` is set. `RUST_LOG`
//! takes precedence over `log.level`.

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::Config;
use crate::error::Error;

pub const LOG_FILE: &str = "ipctl.log";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Level applied to this crate's events. `--verbose` raises it to at
/// least `debug`.
pub fn effective_level(level: &str, verbose: bool) -> Result<&'static str> {
    let level = level.trim().to_ascii_lowercase();
    let index = LEVELS
        .iter()
        .position(|l| *l == level)
        .ok_or_else(|| Error::ConfigLoad(format!("log.level: unknown level '{}'", level)))?;
    let debug = 1;
    Ok(if verbose && index > debug {
        LEVELS[debug]
    } else {
        LEVELS[index]
    })
}

fn layer<W>(writer: W, json: bool, ansi: bool, utc: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let base = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
    match (json, utc) {
        (true, true) => base.json().with_timer(ChronoUtc::rfc_3339()).boxed(),
        (true, false) => base.json().with_timer(ChronoLocal::rfc_3339()).boxed(),
        (false, true) => base.with_timer(ChronoUtc::rfc_3339()).boxed(),
        (false, false) => base.with_timer(ChronoLocal::rfc_3339()).boxed(),
    }
}

fn is_utc(timezone: &str) -> bool {
    !timezone.eq_ignore_ascii_case("local")
}

/// Installs the global subscriber. Does nothing when neither the console
/// nor the file layer is enabled.
pub fn init(config: &Config, verbose: bool) -> Result<()> {
    let level = effective_level(&config.log.level, verbose)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if verbose {
        layers.push(layer(
            std::io::stderr,
            config.log.console_json,
            !config.terminal.no_color && atty::is(atty::Stream::Stderr),
            is_utc(&config.terminal.timestamp_timezone),
        ));
    }
    if config.log.file_enabled {
        std::fs::create_dir_all(&config.working_dir).with_context(|| {
            format!(
                "Failed to create working directory {}",
                config.working_dir.display()
            )
        })?;
        let appender = tracing_appender::rolling::never(&config.working_dir, LOG_FILE);
        layers.push(layer(
            appender,
            config.log.file_json,
            false,
            is_utc(&config.log.timestamp_timezone),
        ));
    }
    if layers.is_empty() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,ipctl={}", level)))
        .context("Invalid log filter")?;

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::registry().with(layers).with(filter).try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_to_debug() {
        assert_eq!(effective_level("info", true).unwrap(), "debug");
        assert_eq!(effective_level("trace", true).unwrap(), "trace");
        assert_eq!(effective_level("WARN", false).unwrap(), "warn");
    }

    #[test]
    fn unknown_level_is_a_config_error() {
        let err = effective_level("loud", false).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ConfigLoad(_))));
    }

    #[test]
    fn timezone_defaults_to_utc() {
        assert!(is_utc("utc"));
        assert!(is_utc(""));
        assert!(!is_utc("Local"));
    }
}

//! Structured logging for Spectre
//!
//! Logs go to stderr so stdout stays free for command output (responses,
//! compiled scripts). All logs use structured fields.
//!
//! # Log Format Conventions
//!
//! - `operation`: The operation being performed (e.g., "procedure.run", "compiler.compile")
//! - `status`: The result status ("success", "hit", "miss", "error")
//! - `cache_key`: Compiled skeleton cache key
//! - `path`: File the operation touched
//!
//! # Examples
//!
//! ```rust
//! use tracing::debug;
//!
//! let key = "procedure_0123456789abcdef_default_default";
//! debug!(
//!     operation = "compiler.compile",
//!     status = "hit",
//!     cache_key = key,
//!     "reusing compiled procedure"
//! );
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

pub const LOG_FORMAT_ENV: &str = "SPECTRE_LOG_FORMAT";

/// Formatter that labels every line "spectre" instead of the module path
struct SpectreFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for SpectreFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{}{:5}(spectre)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(spectre): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, for terminals
    Pretty,
    /// No colors, for CI and redirected output
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse from `SPECTRE_LOG_FORMAT`, defaulting to compact under CI
    pub fn from_env() -> Self {
        let requested = std::env::var(LOG_FORMAT_ENV).unwrap_or_default();
        Self::parse(&requested, std::env::var_os("CI").is_some())
    }

    fn parse(requested: &str, in_ci: bool) -> Self {
        match requested.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ if in_ci => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` sets the filter (default `info`, or `debug` when `verbose`),
/// `SPECTRE_LOG_FORMAT` the format. Calling it twice is a no-op.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);

    // try_init: tests and embedders may already have a subscriber
    let _ = match LogFormat::from_env() {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .event_format(SpectreFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .event_format(SpectreFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };
}

//! Telemetry initialization.
//!
//! Controlled by two environment variables:
//! - `ARBOR_LOG`: an `EnvFilter` directive (`debug`, `arbor::sink=debug`).
//!   Unset or empty → no subscriber is installed (tracing disabled).
//! - `ARBOR_LOG_FORMAT`: `json` for JSON events, anything else for the
//!   human-readable formatter. Both write to stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter directive variable.
pub const LOG_ENV: &str = "ARBOR_LOG";
/// Output format variable.
pub const FORMAT_ENV: &str = "ARBOR_LOG_FORMAT";

/// Output format of the installed subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber described by the environment.
///
/// Returns the chosen format, or `None` when logging stays disabled.
/// Calling it twice is harmless: the second install is ignored.
pub fn init() -> Option<LogFormat> {
    let directive = std::env::var(LOG_ENV).ok().filter(|d| !d.trim().is_empty())?;
    let format = LogFormat::from_env_value(std::env::var(FORMAT_ENV).ok().as_deref());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("warning: ignoring invalid {LOG_ENV}={directive:?}: {e}");
        EnvFilter::new("info")
    });

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
    };
    installed.ok().map(|()| format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_values() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("compact")), LogFormat::Pretty);
    }
}

//! Tracing bootstrap for binaries and test harnesses.
//!
//! Library code only emits `tracing` events. Whoever owns the process calls
//! [`init_tracing`] once to decide where they go. `RUST_LOG` always wins over
//! the directive passed in.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CommonError, CommonResult};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output for local development
    Pretty,
    /// Single-line human-readable output
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(CommonError::config_field("log_format", format!("unknown format '{other}'"))),
        }
    }
}

fn env_filter(default_directive: &str) -> CommonResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| CommonError::config_field("log_directive", e.to_string())),
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed (e.g. by a
/// previous test in the same binary), which is not treated as an error.
///
/// # Errors
///
/// Returns [`CommonError::Config`] when `default_directive` cannot be parsed
/// and `RUST_LOG` is unset.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> CommonResult<bool> {
    let filter = env_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    Ok(installed.is_ok())
}

/// Subscriber for tests: compact output captured by the test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("ratewarden=debug"))
        .with(fmt::layer().compact().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates log format parsing is case-insensitive and rejects unknown
    /// formats.
    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    /// Validates that installing twice is reported rather than failing.
    #[test]
    fn test_init_tracing_is_idempotent() {
        let first = init_tracing("info", LogFormat::Compact).unwrap();
        let second = init_tracing("info", LogFormat::Json).unwrap();
        assert!(!(first && second));
    }
}

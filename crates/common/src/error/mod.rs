//! Common error types and classification shared by every Ratewarden crate.
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: failures reading local inputs (missing settings,
//!    undecodable files, unreadable paths) that are not specific to any
//!    single component.
//! 2. **`ErrorClassification` trait**: the interface retry logic and logging
//!    use to ask an error whether it is retryable, how severe it is, and
//!    whether the remote side asked for a specific wait.
//! 3. **`ErrorSeverity` enum**: a unified severity scale for log levels and
//!    alerting.
//!
//! Component errors (for example the typed API error in `ratewarden-core`)
//! implement `ErrorClassification` themselves and compose `CommonError` where
//! a generic failure needs to be carried along.
//!
//! ```rust,ignore
//! use ratewarden_common::error::{CommonError, CommonResult};
//!
//! fn read_settings(path: &Path) -> CommonResult<Settings> {
//!     let raw = std::fs::read_to_string(path)?;
//!     Ok(toml::from_str(&raw)?)
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using `CommonError`
pub type CommonResult<T> = Result<T, CommonError>;

/// Failures shared by every crate: loading, parsing and reading
/// configuration and other local inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A setting is missing or malformed
    Config {
        /// Human readable description
        message: String,
        /// Offending field or variable, when known
        field: Option<String>,
    },

    /// Input could not be decoded
    Serialization {
        /// Human readable description
        message: String,
        /// Wire format involved (JSON, TOML, ...)
        format: Option<String>,
    },

    /// A file could not be read
    Persistence {
        /// Human readable description
        message: String,
        /// File involved
        path: Option<String>,
    },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field: Some(field) } => {
                write!(f, "Configuration error in field '{field}': {message}")
            }
            Self::Config { message, field: None } => write!(f, "Configuration error: {message}"),
            Self::Serialization { message, format: Some(format) } => {
                write!(f, "Serialization error ({format}): {message}")
            }
            Self::Serialization { message, format: None } => {
                write!(f, "Serialization error: {message}")
            }
            Self::Persistence { message, path: Some(path) } => {
                write!(f, "Could not read '{path}': {message}")
            }
            Self::Persistence { message, path: None } => write!(f, "Read error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

// A bad or unreadable input stays bad on the next attempt.
crate::impl_error_classification!(CommonError,
    CommonError::Config { .. } | CommonError::Serialization { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    CommonError::Persistence { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a read error for `path`
    pub fn unreadable<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Persistence { message: message.into(), path: Some(path.into()) }
    }

    /// Key/value pairs describing the error, for structured log events.
    ///
    /// The first pair is always `("error_type", ...)`.
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let (error_type, message, detail) = match self {
            Self::Config { message, field } => {
                ("config", message, field.as_ref().map(|f| ("field", f)))
            }
            Self::Serialization { message, format } => {
                ("serialization", message, format.as_ref().map(|f| ("format", f)))
            }
            Self::Persistence { message, path } => {
                ("persistence", message, path.as_ref().map(|p| ("path", p)))
            }
        };

        let mut fields = vec![("error_type", error_type.to_string()), ("message", message.clone())];
        fields.extend(detail.map(|(key, value)| (key, value.clone())));
        fields
    }
}

/// Error classification trait for consistent error handling across crates
///
/// Retry engines, log sinks and the gateway only talk to errors through this
/// interface, so every error type in the workspace implements it.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: dropped connections, throttling,
    /// temporary unavailability of the remote service.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the wait requested by the remote side, if any
    ///
    /// Returns `Some(Duration)` when the failure carried an explicit delay
    /// (e.g. a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence { message: err.to_string(), path: None }
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

/// Implement `ErrorClassification` for an enum by listing each variant's
/// classification.
///
/// ```rust,ignore
/// impl_error_classification!(LoaderError,
///     LoaderError::Missing(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     },
///     LoaderError::Busy { wait } => {
///         retryable: true,
///         severity: ErrorSeverity::Warning,
///         critical: false,
///         retry_after: Some(*wait),
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (@retry_after $retry_after:expr) => { $retry_after };
    (@retry_after) => { ::std::option::Option::None };
    (
        $error_type:ty
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )+
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            #[allow(unused_variables)]
            fn is_retryable(&self) -> bool {
                match self {
                    $( $variant => $retryable, )+
                }
            }

            #[allow(unused_variables)]
            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    $( $variant => $severity, )+
                }
            }

            #[allow(unused_variables)]
            fn is_critical(&self) -> bool {
                match self {
                    $( $variant => $critical, )+
                }
            }

            #[allow(unused_variables)]
            fn retry_after(&self) -> ::std::option::Option<::std::time::Duration> {
                match self {
                    $( $variant => $crate::impl_error_classification!(@retry_after $($retry_after)?), )+
                }
            }
        }
    };
}

//! Typed error taxonomy for calls made through the resilience layer.
//!
//! Every failure an operation can report is normalized into [`ApiError`], a
//! closed set of variants the retry policy matches on. Construction-time
//! problems are reported separately as [`ConfigError`] and never enter the
//! retry flow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ratewarden_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest server-requested wait the layer is willing to honour.
pub const MAX_SERVER_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Wait assumed for a 429 response without a `Retry-After` value.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Status codes retried by default for server and client errors.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Boxed underlying cause of a transport failure.
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for operations surfaced to callers
pub type ApiResult<T> = Result<T, ApiError>;

/// Discriminator of an [`ApiError`], also used in retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The remote service throttled the call
    RateLimit,
    /// Transport-level failure (connection reset, DNS, TLS, unrecognized)
    Network,
    /// HTTP 5xx
    ServerError,
    /// HTTP 4xx other than authentication failures
    ClientError,
    /// Credentials rejected
    Authentication,
    /// Admission queue full
    Capacity,
}

impl ErrorKind {
    /// Stable lowercase name used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate-limit",
            Self::Network => "network",
            Self::ServerError => "server-error",
            Self::ClientError => "client-error",
            Self::Authentication => "authentication",
            Self::Capacity => "capacity",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single call made through the resilience layer
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote service throttled the call and asked us to wait
    #[error("rate limit exceeded: {message} (retry after {retry_after:?})")]
    RateLimit {
        /// Description from the remote service
        message: String,
        /// Server-mandated wait before the next attempt
        retry_after: Duration,
        /// Quota size reported by the server, if any
        limit: Option<u32>,
        /// Remaining quota reported by the server, if any
        remaining: Option<u32>,
    },

    /// Transport failure
    #[error("network error: {message}")]
    Network {
        /// Description of the failure
        message: String,
        /// Whether this particular failure is worth retrying
        retryable: bool,
        /// Underlying cause, when one was captured
        #[source]
        source: Option<ErrorSource>,
    },

    /// HTTP 5xx response
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response summary
        message: String,
    },

    /// HTTP 4xx response
    #[error("client error {status}: {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Response summary
        message: String,
    },

    /// Credentials were rejected
    #[error("authentication failed: {message}")]
    Authentication {
        /// Description from the remote service
        message: String,
    },

    /// The admission queue was full when the call was submitted
    #[error("admission queue is full ({queue_size}/{max_queue_size} waiting)")]
    Capacity {
        /// Queue length at the time of rejection
        queue_size: usize,
        /// Configured queue bound
        max_queue_size: usize,
    },
}

impl ApiError {
    /// Rate-limit error carrying the server's `Retry-After`
    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Duration) -> Self {
        Self::RateLimit { message: message.into(), retry_after, limit: None, remaining: None }
    }

    /// Rate-limit error with the quota headers the server reported
    pub fn rate_limit_detailed<S: Into<String>>(
        message: S,
        retry_after: Duration,
        limit: u32,
        remaining: u32,
    ) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
            limit: Some(limit),
            remaining: Some(remaining),
        }
    }

    /// Transport failure with an explicit retryability verdict
    pub fn network<S: Into<String>>(message: S, retryable: bool) -> Self {
        Self::Network { message: message.into(), retryable, source: None }
    }

    /// Generic transport failure wrapping an unrecognized error.
    ///
    /// This is what unknown failures normalize to; it is retryable.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network { message: err.to_string(), retryable: true, source: Some(Arc::new(err)) }
    }

    /// HTTP 5xx
    pub fn server<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// HTTP 4xx
    pub fn client<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Client { status, message: message.into() }
    }

    /// Rejected credentials
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Queue-full rejection from the admission controller
    #[must_use]
    pub const fn capacity(queue_size: usize, max_queue_size: usize) -> Self {
        Self::Capacity { queue_size, max_queue_size }
    }

    /// Map an HTTP status to the matching variant.
    ///
    /// 401/403 become [`ApiError::Authentication`], 429 becomes a rate-limit
    /// error with [`DEFAULT_RATE_LIMIT_WAIT`], other 4xx are client errors
    /// and everything else is a server error.
    pub fn from_status<S: Into<String>>(status: u16, message: S) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Authentication { message },
            429 => Self::rate_limit(message, DEFAULT_RATE_LIMIT_WAIT),
            400..=499 => Self::Client { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// Discriminator of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Network { .. } => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::ServerError,
            Self::Client { .. } => ErrorKind::ClientError,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Capacity { .. } => ErrorKind::Capacity,
        }
    }

    /// HTTP status for server and client errors (429 for rate limits)
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(429),
            Self::Authentication { .. } | Self::Network { .. } | Self::Capacity { .. } => None,
        }
    }

    /// Server-mandated wait carried by a rate-limit error
    #[must_use]
    pub const fn server_retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether a rate-limit error may be retried.
    ///
    /// True when the requested wait is within [`MAX_SERVER_RETRY_AFTER`];
    /// always false for other variants.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after <= MAX_SERVER_RETRY_AFTER,
            _ => false,
        }
    }

    /// Short single-line summary for logs and metrics snapshots
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => self.can_retry(),
            Self::Network { retryable, .. } => *retryable,
            Self::Server { status, .. } | Self::Client { status, .. } => {
                DEFAULT_RETRYABLE_STATUS_CODES.contains(status)
            }
            Self::Authentication { .. } | Self::Capacity { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RateLimit { .. } | Self::Capacity { .. } => ErrorSeverity::Warning,
            Self::Network { .. } | Self::Server { .. } | Self::Client { .. } => {
                ErrorSeverity::Error
            }
            Self::Authentication { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        self.server_retry_after()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped in anyhow further up the stack.
        match err.downcast::<Self>() {
            Ok(api) => api,
            Err(other) => Self::Network {
                message: format!("{other:#}"),
                retryable: true,
                source: Some(Arc::from(Box::<dyn std::error::Error + Send + Sync>::from(other))),
            },
        }
    }
}

impl From<CommonError> for ApiError {
    fn from(err: CommonError) -> Self {
        let retryable = err.is_retryable();
        Self::Network { message: err.to_string(), retryable, source: Some(Arc::new(err)) }
    }
}

/// Invalid configuration detected at construction time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field failed validation
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// A configuration source could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(#[from] CommonError),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`]
    pub fn invalid<S: Into<String>>(field: &'static str, message: S) -> Self {
        Self::Invalid { field, message: message.into() }
    }
}

ratewarden_common::impl_error_classification!(ConfigError,
    ConfigError::Invalid { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    ConfigError::Load(source) => {
        retryable: source.is_retryable(),
        severity: source.severity(),
        critical: source.is_critical(),
    }
);

/// Result type for constructors and loaders
pub type ConfigResult<T> = Result<T, ConfigError>;

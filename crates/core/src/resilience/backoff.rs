//! Backoff strategies and jitter.
//!
//! [`base_delay`] and [`apply_jitter`] are pure: the first is fully
//! deterministic, the second draws only from the random generator it is
//! handed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use ratewarden_common::duration_millis;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ConfigError, ConfigResult};

/// Caller-supplied backoff: `(attempt_number, last_error) -> delay`
pub type CustomBackoff = Arc<dyn Fn(u32, Option<&ApiError>) -> Duration + Send + Sync>;

/// How the base delay grows with the attempt number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// Always `initial_delay`
    Fixed,
    /// `initial_delay * attempt`
    Linear,
    /// `initial_delay * multiplier^(attempt - 1)`
    #[default]
    Exponential,
    /// Delegates to [`BackoffConfig::custom`]
    Custom,
}

/// Backoff configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// How the delay grows with the attempt number
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    /// Delay after the first failed attempt
    #[serde(rename = "initial_delay_ms", with = "duration_millis")]
    pub initial_delay: Duration,
    /// Upper bound for any computed delay
    #[serde(rename = "max_delay_ms", with = "duration_millis")]
    pub max_delay: Duration,
    /// Growth factor, only used by [`BackoffKind::Exponential`]
    pub multiplier: f64,
    /// Delay function for [`BackoffKind::Custom`]
    #[serde(skip)]
    pub custom: Option<CustomBackoff>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            custom: None,
        }
    }
}

impl fmt::Debug for BackoffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffConfig")
            .field("kind", &self.kind)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl BackoffConfig {
    /// Same delay before every retry
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            custom: None,
        }
    }

    /// `initial_delay * attempt`, capped at `max_delay`
    #[must_use]
    pub fn linear(initial_delay: Duration, max_delay: Duration) -> Self {
        Self { kind: BackoffKind::Linear, initial_delay, max_delay, multiplier: 1.0, custom: None }
    }

    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`
    #[must_use]
    pub fn exponential(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self { kind: BackoffKind::Exponential, initial_delay, max_delay, multiplier, custom: None }
    }

    /// Custom backoff; the function result is still capped at `max_delay`
    pub fn custom<F>(initial_delay: Duration, max_delay: Duration, f: F) -> Self
    where
        F: Fn(u32, Option<&ApiError>) -> Duration + Send + Sync + 'static,
    {
        Self {
            kind: BackoffKind::Custom,
            initial_delay,
            max_delay,
            multiplier: 1.0,
            custom: Some(Arc::new(f)),
        }
    }

    /// Validate the backoff configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a delay is zero, the initial
    /// delay exceeds the maximum, an exponential multiplier is not greater
    /// than 1, or a custom strategy has no function.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::invalid("backoff.initial_delay_ms", "must be greater than 0"));
        }
        if self.max_delay.is_zero() {
            return Err(ConfigError::invalid("backoff.max_delay_ms", "must be greater than 0"));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "backoff.initial_delay_ms",
                format!(
                    "{}ms exceeds max delay of {}ms",
                    self.initial_delay.as_millis(),
                    self.max_delay.as_millis()
                ),
            ));
        }
        match self.kind {
            BackoffKind::Exponential if !(self.multiplier.is_finite() && self.multiplier > 1.0) => {
                Err(ConfigError::invalid(
                    "backoff.multiplier",
                    format!("exponential backoff requires a multiplier > 1, got {}", self.multiplier),
                ))
            }
            BackoffKind::Custom if self.custom.is_none() => Err(ConfigError::invalid(
                "backoff.type",
                "custom backoff requires a delay function",
            )),
            _ => Ok(()),
        }
    }
}

/// Randomization applied on top of the base delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JitterKind {
    /// Delay is used unchanged
    None,
    /// Uniform in `[0, base]`
    Full,
    /// Uniform in `[base / 2, base]`
    #[default]
    Equal,
    /// Uniform in `[initial, base * 3]`, capped at the max delay
    Decorrelated,
}

/// Jitter configuration
///
/// `factor` scales how much of the range is randomized. At `1.0` the ranges
/// are the ones documented on [`JitterKind`]; at `0.0` jitter is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    #[serde(rename = "type")]
    pub kind: JitterKind,
    pub factor: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self { kind: JitterKind::Equal, factor: 1.0 }
    }
}

impl JitterConfig {
    #[must_use]
    pub const fn none() -> Self {
        Self { kind: JitterKind::None, factor: 1.0 }
    }

    #[must_use]
    pub const fn new(kind: JitterKind) -> Self {
        Self { kind, factor: 1.0 }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `factor` is outside `[0, 1]`.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.factor) {
            return Err(ConfigError::invalid(
                "jitter.factor",
                format!("must be within [0, 1], got {}", self.factor),
            ));
        }
        Ok(())
    }
}

/// Base delay for `attempt` (1-based), capped at `config.max_delay`.
///
/// Attempt numbers below 1 are treated as 1.
#[must_use]
pub fn base_delay(config: &BackoffConfig, attempt: u32, error: Option<&ApiError>) -> Duration {
    let attempt = attempt.max(1);
    let delay = match config.kind {
        BackoffKind::Fixed => config.initial_delay,
        BackoffKind::Linear => config.initial_delay.saturating_mul(attempt),
        BackoffKind::Exponential => {
            let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
            let millis = config.initial_delay.as_millis() as f64 * config.multiplier.powi(exponent);
            millis_to_duration(millis, config.max_delay)
        }
        BackoffKind::Custom => match &config.custom {
            Some(f) => f(attempt, error),
            None => config.initial_delay,
        },
    };
    delay.min(config.max_delay)
}

/// Apply jitter to `delay`.
///
/// `floor` is the configured initial delay (lower bound of decorrelated
/// jitter); `ceiling` caps the decorrelated range.
pub fn apply_jitter<R: Rng + ?Sized>(
    jitter: &JitterConfig,
    delay: Duration,
    floor: Duration,
    ceiling: Duration,
    rng: &mut R,
) -> Duration {
    let base = duration_to_millis(delay);
    let factor = jitter.factor.clamp(0.0, 1.0);

    let (low, high) = match jitter.kind {
        JitterKind::None => return delay,
        JitterKind::Full => (scale(base, 1.0 - factor), base),
        JitterKind::Equal => (base - scale(base, factor / 2.0), base),
        JitterKind::Decorrelated => {
            let cap = duration_to_millis(ceiling);
            let high = base.saturating_add(scale(base, 2.0 * factor)).min(cap);
            let low = duration_to_millis(floor).min(high);
            (low, high)
        }
    };

    if low >= high {
        return Duration::from_millis(high);
    }
    Duration::from_millis(rng.gen_range(low..=high))
}

fn scale(millis: u64, factor: f64) -> u64 {
    (millis as f64 * factor).round() as u64
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn millis_to_duration(millis: f64, cap: Duration) -> Duration {
    if !millis.is_finite() || millis >= cap.as_millis() as f64 {
        cap
    } else {
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

//! Named retry policy bundles.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::{BackoffConfig, JitterConfig, JitterKind};
use super::circuit_breaker::CircuitBreakerConfig;
use super::policy::{RetryCondition, RetryPolicyConfig};
use crate::error::{ConfigError, ErrorKind};

/// Ready-made retry configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyPreset {
    /// Few quick retries, no breaker
    Development,
    /// Tiny fixed delays for test suites
    Testing,
    /// Exponential backoff with equal jitter and a breaker
    Production,
    /// Short delays for chatty callers
    HighFrequency,
    /// Long backoff for quota-constrained services
    RateLimitAware,
    /// Many retries with decorrelated jitter for flaky networks
    NetworkResilient,
}

impl PolicyPreset {
    pub const ALL: [Self; 6] = [
        Self::Development,
        Self::Testing,
        Self::Production,
        Self::HighFrequency,
        Self::RateLimitAware,
        Self::NetworkResilient,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
            Self::HighFrequency => "high-frequency",
            Self::RateLimitAware => "rate-limit-aware",
            Self::NetworkResilient => "network-resilient",
        }
    }

    /// Build the policy configuration for this preset
    #[must_use]
    pub fn config(self) -> RetryPolicyConfig {
        match self {
            Self::Development => RetryPolicyConfig {
                backoff: BackoffConfig::fixed(Duration::from_millis(500)),
                jitter: JitterConfig::none(),
                condition: condition(2, Duration::from_secs(10)),
                circuit_breaker: CircuitBreakerConfig::disabled(),
                enable_metrics: true,
            },
            Self::Testing => RetryPolicyConfig {
                backoff: BackoffConfig::fixed(Duration::from_millis(10)),
                jitter: JitterConfig::none(),
                condition: condition(3, Duration::from_secs(1)),
                circuit_breaker: CircuitBreakerConfig::disabled(),
                enable_metrics: true,
            },
            Self::Production => RetryPolicyConfig {
                backoff: BackoffConfig::exponential(
                    Duration::from_secs(1),
                    2.0,
                    Duration::from_secs(30),
                ),
                jitter: JitterConfig::new(JitterKind::Equal),
                condition: condition(5, Duration::from_secs(300)),
                circuit_breaker: CircuitBreakerConfig::default(),
                enable_metrics: true,
            },
            Self::HighFrequency => RetryPolicyConfig {
                backoff: BackoffConfig::exponential(
                    Duration::from_millis(100),
                    1.5,
                    Duration::from_secs(2),
                ),
                jitter: JitterConfig::new(JitterKind::Full),
                condition: condition(3, Duration::from_secs(10)),
                circuit_breaker: CircuitBreakerConfig {
                    enabled: true,
                    failure_threshold: 10,
                    recovery_timeout: Duration::from_secs(10),
                    half_open_success_threshold: 2,
                },
                enable_metrics: true,
            },
            Self::RateLimitAware => RetryPolicyConfig {
                backoff: BackoffConfig::exponential(
                    Duration::from_secs(2),
                    2.0,
                    Duration::from_secs(60),
                ),
                jitter: JitterConfig::new(JitterKind::Equal),
                condition: RetryCondition {
                    retryable_error_kinds: vec![
                        ErrorKind::RateLimit,
                        ErrorKind::ServerError,
                        ErrorKind::Network,
                    ],
                    ..condition(5, Duration::from_secs(600))
                },
                circuit_breaker: CircuitBreakerConfig {
                    enabled: true,
                    failure_threshold: 3,
                    recovery_timeout: Duration::from_secs(120),
                    half_open_success_threshold: 2,
                },
                enable_metrics: true,
            },
            Self::NetworkResilient => RetryPolicyConfig {
                backoff: BackoffConfig::exponential(
                    Duration::from_millis(500),
                    2.0,
                    Duration::from_secs(30),
                ),
                jitter: JitterConfig::new(JitterKind::Decorrelated),
                condition: RetryCondition {
                    retryable_status_codes: vec![520, 521, 522, 523, 524],
                    ..condition(7, Duration::from_secs(300))
                },
                circuit_breaker: CircuitBreakerConfig {
                    enabled: true,
                    failure_threshold: 8,
                    recovery_timeout: Duration::from_secs(30),
                    half_open_success_threshold: 3,
                },
                enable_metrics: true,
            },
        }
    }
}

fn condition(max_attempts: u32, max_total_time: Duration) -> RetryCondition {
    RetryCondition { max_attempts, max_total_time, ..RetryCondition::default() }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|preset| preset.as_str() == normalized).ok_or_else(|| {
            ConfigError::invalid("preset", format!("unknown retry preset '{s}'"))
        })
    }
}

impl From<PolicyPreset> for RetryPolicyConfig {
    fn from(preset: PolicyPreset) -> Self {
        preset.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::backoff::BackoffKind;

    /// Validates every preset passes validation.
    #[test]
    fn test_presets_are_valid() {
        for preset in PolicyPreset::ALL {
            assert!(preset.config().validate().is_ok(), "{preset} is invalid");
        }
    }

    /// Validates parsing accepts kebab and snake case and rejects unknown
    /// names.
    #[test]
    fn test_parse() {
        assert_eq!("rate-limit-aware".parse::<PolicyPreset>().unwrap(), PolicyPreset::RateLimitAware);
        assert_eq!(" High_Frequency ".parse::<PolicyPreset>().unwrap(), PolicyPreset::HighFrequency);
        assert!("aggressive".parse::<PolicyPreset>().is_err());

        for preset in PolicyPreset::ALL {
            assert_eq!(preset.to_string().parse::<PolicyPreset>().unwrap(), preset);
        }
    }

    /// Validates a few defining traits of the presets.
    #[test]
    fn test_preset_shapes() {
        let testing = PolicyPreset::Testing.config();
        assert_eq!(testing.backoff.kind, BackoffKind::Fixed);
        assert!(!testing.circuit_breaker.enabled);

        let production = PolicyPreset::Production.config();
        assert_eq!(production.condition.max_attempts, 5);
        assert!(production.circuit_breaker.enabled);

        let rate_limited = RetryPolicyConfig::from(PolicyPreset::RateLimitAware);
        assert!(!rate_limited.condition.retryable_error_kinds.contains(&ErrorKind::ClientError));
    }
}

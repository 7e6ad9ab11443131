//! Configuration for the resilience layer
//!
//! [`ResilienceConfig`] bundles the admission and retry sections. The
//! [`loader`] module builds one from environment variables or a file.

pub mod loader;

use serde::{Deserialize, Serialize};

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

use crate::admission::AdmissionConfig;
use crate::error::ConfigResult;
use crate::resilience::{PolicyPreset, RetryPolicyConfig};

/// Complete resilience configuration
///
/// When `preset` is set, it replaces the `retry` section as the
/// configuration is loaded; later overrides (such as environment variables)
/// apply on top of the preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub admission: AdmissionConfig,
    pub retry: RetryPolicyConfig,
    pub preset: Option<PolicyPreset>,
}

impl ResilienceConfig {
    /// Default admission settings with the retry section taken from `preset`
    #[must_use]
    pub fn from_preset(preset: PolicyPreset) -> Self {
        Self { admission: AdmissionConfig::default(), retry: preset.config(), preset: Some(preset) }
    }

    /// Copy of this configuration with `preset`, if any, expanded into the
    /// retry section
    #[must_use]
    pub fn with_preset_applied(mut self) -> Self {
        self.apply_preset();
        self
    }

    pub(crate) fn apply_preset(&mut self) {
        if let Some(preset) = self.preset {
            self.retry = preset.config();
        }
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`](crate::error::ConfigError) found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.admission.validate()?;
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resilience::BackoffKind;

    #[test]
    fn test_default_is_valid() {
        assert!(ResilienceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preset_replaces_retry_section() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            preset = "testing"

            [admission]
            max_requests = 10
            window_ms = 1000

            [retry.condition]
            max_attempts = 9
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.condition.max_attempts, 9);
        let applied = config.with_preset_applied();
        assert_eq!(applied.retry.condition.max_attempts, 3);
        assert_eq!(applied.retry.backoff.kind, BackoffKind::Fixed);
        assert_eq!(applied.admission.window, Duration::from_secs(1));
    }

    #[test]
    fn test_from_preset() {
        let config = ResilienceConfig::from_preset(PolicyPreset::NetworkResilient);
        assert_eq!(config.preset, Some(PolicyPreset::NetworkResilient));
        assert_eq!(config.retry.condition.max_attempts, 7);
    }
}

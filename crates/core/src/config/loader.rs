//! Configuration loader
//!
//! Loads [`ResilienceConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Load `.env` from the working directory, if present
//! 2. Try environment variables
//! 3. If the required variables are missing, fall back to a config file
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `RATEWARDEN_MAX_REQUESTS`: Admissions per window (required)
//! - `RATEWARDEN_WINDOW_MS`: Window length in milliseconds (required)
//! - `RATEWARDEN_MAX_QUEUE_SIZE`: Callers allowed to wait for a slot
//! - `RATEWARDEN_PRESET`: Retry preset name, e.g. `production`
//! - `RATEWARDEN_MAX_ATTEMPTS`: Overrides the retry attempt limit
//! - `RATEWARDEN_ENABLE_METRICS`: Whether retry metrics are kept (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` and `./ratewarden.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ratewarden_common::CommonError;

use super::ResilienceConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::resilience::PolicyPreset;

const ENV_MAX_REQUESTS: &str = "RATEWARDEN_MAX_REQUESTS";
const ENV_WINDOW_MS: &str = "RATEWARDEN_WINDOW_MS";
const ENV_MAX_QUEUE_SIZE: &str = "RATEWARDEN_MAX_QUEUE_SIZE";
const ENV_PRESET: &str = "RATEWARDEN_PRESET";
const ENV_MAX_ATTEMPTS: &str = "RATEWARDEN_MAX_ATTEMPTS";
const ENV_ENABLE_METRICS: &str = "RATEWARDEN_ENABLE_METRICS";

const FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "ratewarden.json", "ratewarden.toml"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns a [`ConfigError`] if neither source yields a configuration, a
/// file cannot be parsed, or the loaded configuration is invalid.
pub fn load() -> ConfigResult<ResilienceConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::Load(source)) => {
            let fields = source.as_tracing_fields();
            tracing::debug!(?fields, "Environment configuration unavailable, trying file");
            load_from_file(None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Environment configuration invalid, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Reads `.env` first. Admission quota variables are required; the rest
/// fall back to defaults.
///
/// # Errors
/// Returns a [`ConfigError`] if a required variable is missing, a value does
/// not parse, or the result is invalid.
pub fn load_from_env() -> ConfigResult<ResilienceConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let mut config = ResilienceConfig::default();
    config.admission.max_requests = parse_env(ENV_MAX_REQUESTS, &env_var(ENV_MAX_REQUESTS)?)?;
    config.admission.window =
        std::time::Duration::from_millis(parse_env(ENV_WINDOW_MS, &env_var(ENV_WINDOW_MS)?)?);

    if let Some(raw) = env_opt(ENV_MAX_QUEUE_SIZE) {
        config.admission.max_queue_size = parse_env(ENV_MAX_QUEUE_SIZE, &raw)?;
    }
    if let Some(raw) = env_opt(ENV_PRESET) {
        config.preset = Some(PolicyPreset::from_str(&raw)?);
        config.apply_preset();
    }
    if let Some(raw) = env_opt(ENV_MAX_ATTEMPTS) {
        config.retry.condition.max_attempts = parse_env(ENV_MAX_ATTEMPTS, &raw)?;
    }
    config.retry.enable_metrics = env_bool(ENV_ENABLE_METRICS, config.retry.enable_metrics)?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. JSON and TOML are
/// supported (detected by file extension). A preset named in the file
/// replaces its `retry` section.
///
/// # Errors
/// Returns a [`ConfigError`] if the file is missing or unreadable, the
/// format is unsupported or malformed, or the result is invalid.
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<ResilienceConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!("Config file not found: {}", p.display()))
                    .into());
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        let err = CommonError::unreadable(config_path.display().to_string(), e.to_string());
        tracing::warn!(fields = ?err.as_tracing_fields(), "Configuration file unreadable");
        err
    })?;
    let mut config = parse_config(&contents, &config_path)?;
    config.apply_preset();
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> ConfigResult<ResilienceConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let parsed = match extension {
        "toml" => toml::from_str(contents).map_err(CommonError::from),
        "json" => serde_json::from_str(contents).map_err(CommonError::from),
        other => Err(CommonError::config_field(
            "path",
            format!("Unsupported config format: {other}"),
        )),
    };
    Ok(parsed?)
}

/// Probe the standard locations for a configuration file
///
/// Returns the first file that exists, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| FILE_NAMES.map(|name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn env_var(key: &str) -> ConfigResult<String> {
    std::env::var(key).map_err(|_| {
        CommonError::config_field(key, "Missing required environment variable").into()
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &'static str, raw: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::invalid(key, format!("'{raw}': {e}")))
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Unset or blank keeps `default`.
fn env_bool(key: &'static str, default: bool) -> ConfigResult<bool> {
    let Some(raw) = env_opt(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{raw}': expected true or false"))),
    }
}

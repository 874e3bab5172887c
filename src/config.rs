use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::*;

pub const DEFAULT_LATITUDE: &str = "40.712776";
pub const DEFAULT_LONGITUDE: &str = "-74.005974";
pub const PREFERENCES_FILE_NAME: &str = "preferences.toml";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub preferences_path: PathBuf,
    pub logs_dir: PathBuf,
    pub telemetry_enabled: bool,
    pub telemetry_path: PathBuf,
    pub service_timeout: Duration,
    pub chat_base_url: String,
    pub chat_model: String,
    pub weather_base_url: String,
    pub weather_api_key: Option<String>,
    /// Mirror subprocess output to stdout while it is captured.
    pub echo_subprocess_output: bool,
}

/// Persisted user preferences. Unknown fields are ignored so older files keep
/// loading after upgrades.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_api_key: Option<String>,
    pub default_to_chat: bool,
    pub cache_enabled: bool,
    pub incognito: bool,
    pub text_speed: TextSpeed,
    pub text_buffer: bool,
    pub path_display: PathDisplay,
    pub startup_enabled: bool,
    pub shortcuts_enabled: bool,
    pub location_enabled: bool,
    pub latitude: String,
    pub longitude: String,
    pub startup_commands: Vec<String>,
    pub saved_chat: Vec<String>,
    pub shortcuts: BTreeMap<String, String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_key: None,
            weather_api_key: None,
            default_to_chat: true,
            cache_enabled: true,
            incognito: false,
            text_speed: TextSpeed::Normal,
            text_buffer: false,
            path_display: PathDisplay::Leaf,
            startup_enabled: true,
            shortcuts_enabled: true,
            location_enabled: false,
            latitude: DEFAULT_LATITUDE.to_string(),
            longitude: DEFAULT_LONGITUDE.to_string(),
            startup_commands: Vec::new(),
            saved_chat: Vec::new(),
            shortcuts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferencesSource {
    Loaded,
    /// No file existed; defaults were written.
    Created,
    /// The file could not be parsed; defaults were written over it.
    Recovered,
}

pub fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".devsh"))
        .unwrap_or_else(|| PathBuf::from(".devsh"))
}

pub fn resolve_runtime_config(cli: &Cli) -> Result<RuntimeConfig> {
    if cli.service_timeout_secs == 0 {
        return Err(anyhow::anyhow!(
            "invalid value '0' for --service-timeout-secs: must be at least 1"
        ));
    }
    for (flag, url) in [
        ("--chat-base-url", &cli.chat_base_url),
        ("--weather-base-url", &cli.weather_base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "invalid value '{url}' for {flag}: expected an http(s) URL"
            ));
        }
    }
    if cli.chat_model.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "invalid value for --chat-model: model name cannot be empty"
        ));
    }

    let data_dir = cli
        .data_dir
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir);

    Ok(RuntimeConfig {
        preferences_path: data_dir.join(PREFERENCES_FILE_NAME),
        logs_dir: data_dir.join("logs"),
        telemetry_enabled: cli.telemetry,
        telemetry_path: data_dir.join("telemetry/events.jsonl"),
        service_timeout: Duration::from_secs(cli.service_timeout_secs),
        chat_base_url: cli.chat_base_url.trim_end_matches('/').to_string(),
        chat_model: cli.chat_model.trim().to_string(),
        weather_base_url: cli.weather_base_url.trim_end_matches('/').to_string(),
        weather_api_key: std::env::var("TOMORROW_IO_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty()),
        echo_subprocess_output: true,
        data_dir,
    })
}

pub fn load_or_create_preferences(path: &Path) -> Result<(Preferences, PreferencesSource)> {
    if !path.exists() {
        let prefs = Preferences::default();
        save_preferences(path, &prefs)
            .with_context(|| format!("failed to create preferences file '{}'", path.display()))?;
        return Ok((prefs, PreferencesSource::Created));
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read preferences file '{}'", path.display()))
        .and_then(|content| {
            toml::from_str::<Preferences>(&content).with_context(|| {
                format!("invalid preferences file '{}'", path.display())
            })
        });

    match parsed {
        Ok(prefs) => Ok((prefs, PreferencesSource::Loaded)),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "preferences unreadable, falling back to defaults"
            );
            let prefs = Preferences::default();
            save_preferences(path, &prefs).with_context(|| {
                format!("failed to recreate preferences file '{}'", path.display())
            })?;
            Ok((prefs, PreferencesSource::Recovered))
        }
    }
}

pub fn save_preferences(path: &Path, prefs: &Preferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create data directory '{}'", parent.display())
            })?;
        }
    }
    let payload = toml::to_string(prefs).context("failed to serialize preferences")?;
    std::fs::write(path, payload)
        .with_context(|| format!("failed to write preferences file '{}'", path.display()))
}

#[cfg(test)]
pub fn test_runtime_config(data_dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        data_dir: data_dir.to_path_buf(),
        preferences_path: data_dir.join(PREFERENCES_FILE_NAME),
        logs_dir: data_dir.join("logs"),
        telemetry_enabled: false,
        telemetry_path: data_dir.join("telemetry/events.jsonl"),
        service_timeout: Duration::from_millis(300),
        chat_base_url: "http://chat.test/v1".to_string(),
        chat_model: "gpt-3.5-turbo".to_string(),
        weather_base_url: "http://weather.test/v4".to_string(),
        weather_api_key: Some("weather-test-key".to_string()),
        echo_subprocess_output: false,
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointSettings {
    pub url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: "https://payload.example.com/get2.php".to_string(),
        }
    }
}

/// Hardware-timing knobs, all in seconds. Defaults mirror the timing the
/// activation sequence was tuned against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutSettings {
    pub asset_wait: u64,
    pub reboot_wait: u64,
    pub reconnect_wait: u64,
    pub reconnect_poll: u64,
    pub stabilize: u64,
    pub syslog_collect: u64,
    pub log_show: u64,
    pub plist_regen: u64,
    pub settle: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            asset_wait: 300,
            reboot_wait: 300,
            reconnect_wait: 180,
            reconnect_poll: 5,
            stabilize: 10,
            syslog_collect: 200,
            log_show: 60,
            plist_regen: 50,
            settle: 30,
        }
    }
}

impl TimeoutSettings {
    pub fn reconnect_wait_duration(&self) -> Duration {
        Duration::from_secs(self.reconnect_wait)
    }

    pub fn syslog_collect_duration(&self) -> Duration {
        Duration::from_secs(self.syslog_collect)
    }

    pub fn log_show_duration(&self) -> Duration {
        Duration::from_secs(self.log_show)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    /// Outer attempts for the structured archive-query strategy.
    pub structured_attempts: u32,
    /// Outer attempts for the raw trace-scan fallback.
    pub raw_scan_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            structured_attempts: 3,
            raw_scan_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSettings {
    /// Bridge CLI used for reboot, archive collection and file transfer.
    pub bridge_path: String,
    /// Info-query CLI (key/value device identity dump).
    pub info_path: String,
    /// Diagnostics CLI used as the reboot fallback.
    pub diagnostics_path: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            bridge_path: String::new(),
            info_path: String::new(),
            diagnostics_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub retries: RetrySettings,
    #[serde(default)]
    pub agent: AgentSettings,
    /// Medium/low confidence identifiers are accepted without blocking when
    /// set. The confidence band is logged either way.
    #[serde(default = "default_auto_approve")]
    pub auto_approve_low_confidence: bool,
    #[serde(default)]
    pub version: String,
}

fn default_auto_approve() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings::default(),
            timeouts: TimeoutSettings::default(),
            retries: RetrySettings::default(),
            agent: AgentSettings::default(),
            auto_approve_low_confidence: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TURNKEY_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".turnkey_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".turnkey_config.backup.json")
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), ""))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = TimeoutSettings::default();
    if config.timeouts.reconnect_wait < 30 {
        config.timeouts.reconnect_wait = defaults.reconnect_wait;
    }
    if config.timeouts.reconnect_poll == 0 {
        config.timeouts.reconnect_poll = defaults.reconnect_poll;
    }
    if config.timeouts.syslog_collect < 60 {
        config.timeouts.syslog_collect = defaults.syslog_collect;
    }
    if config.timeouts.log_show == 0 {
        config.timeouts.log_show = defaults.log_show;
    }
    if config.timeouts.reboot_wait < 60 {
        config.timeouts.reboot_wait = defaults.reboot_wait;
    }
    if config.retries.structured_attempts == 0 {
        config.retries.structured_attempts = 3;
    }
    if config.retries.raw_scan_attempts == 0 {
        config.retries.raw_scan_attempts = 5;
    }
    if config.endpoint.url.trim().is_empty() {
        config.endpoint = EndpointSettings::default();
    }
    config
}

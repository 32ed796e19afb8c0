//! Configuration management for the upcast scheduler
//!
//! This module handles loading and validating configuration from environment
//! variables or a TOML file. Channel credentials are always read from the
//! environment (`<CHANNEL>_CLIENT_ID`, `<CHANNEL>_CLIENT_SECRET`,
//! `<CHANNEL>_EMAIL` with the channel name upper-cased) so that secrets stay
//! out of config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{Channel, Credentials};
use crate::scheduler::UploadPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding one subdirectory per channel
    pub channels_root: PathBuf,

    /// Channel definitions
    pub channels: Vec<ChannelSettings>,

    /// Scheduling policy
    #[serde(default)]
    pub policy: UploadPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One configured channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Unique channel name (also the directory name under the root)
    pub name: String,

    /// Publish account credentials
    #[serde(default, skip_serializing)]
    pub credentials: Credentials,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `UPCAST_CHANNELS` is a comma-separated list of channel names;
    /// `UPCAST_CHANNELS_ROOT` the base directory. Policy fields fall back to
    /// the reference defaults unless overridden.
    pub fn from_env() -> Result<Self> {
        let channels_root = std::env::var("UPCAST_CHANNELS_ROOT")
            .unwrap_or_else(|_| String::from("channels"))
            .into();

        let channel_names = std::env::var("UPCAST_CHANNELS")
            .unwrap_or_else(|_| String::from("channel_1"));

        let channels = channel_names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| ChannelSettings {
                name: name.to_string(),
                credentials: credentials_from_env(name),
            })
            .collect();

        let mut policy = UploadPolicy::default();
        if let Some(minutes) = env_parse("UPCAST_MIN_SPACING_MINUTES") {
            policy.min_spacing_minutes = minutes;
        }
        if let Some(minutes) = env_parse("UPCAST_QUOTA_BACKOFF_MINUTES") {
            policy.quota_backoff_minutes = minutes;
        }
        if let Some(secs) = env_parse("UPCAST_CHECK_INTERVAL_SECS") {
            policy.check_interval_secs = secs;
        }
        if let Some(secs) = env_parse("UPCAST_REPORT_INTERVAL_SECS") {
            policy.report_interval_secs = secs;
        }
        if let Ok(ext) = std::env::var("UPCAST_ARTIFACT_EXTENSION") {
            policy.artifact_extension = ext;
        }

        let logging = LoggingConfig {
            level: std::env::var("UPCAST_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("UPCAST_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
        };

        Ok(Self {
            channels_root,
            channels,
            policy,
            logging,
        })
    }

    /// Load configuration from a TOML file, with credentials from the
    /// environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        for channel in &mut config.channels {
            channel.credentials = credentials_from_env(&channel.name);
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            anyhow::bail!("No channels configured");
        }

        let mut seen = std::collections::HashSet::new();
        for channel in &self.channels {
            if channel.name.is_empty() {
                anyhow::bail!("Channel with empty name");
            }
            if !seen.insert(&channel.name) {
                anyhow::bail!("Duplicate channel name '{}'", channel.name);
            }
        }

        self.policy
            .validate()
            .context("Invalid scheduling policy")?;

        Ok(())
    }

    /// Build the domain [`Channel`] models from this configuration
    pub fn channel_models(&self) -> Vec<Channel> {
        self.channels
            .iter()
            .map(|settings| {
                Channel::new(
                    &self.channels_root,
                    &settings.name,
                    settings.credentials.clone(),
                )
            })
            .collect()
    }
}

/// Read one channel's credentials from the environment
///
/// Missing variables yield empty strings; whether that is fatal is the
/// publish backend's call (a dry-run backend needs none).
fn credentials_from_env(channel: &str) -> Credentials {
    let prefix = channel.to_uppercase();
    Credentials {
        client_id: std::env::var(format!("{prefix}_CLIENT_ID")).unwrap_or_default(),
        client_secret: std::env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
        account_email: std::env::var(format!("{prefix}_EMAIL")).unwrap_or_default(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

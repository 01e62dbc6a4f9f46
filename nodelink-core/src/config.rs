//! src/config.rs
//! ============================================================================
//! # `LinkConfig`: Bridge Configuration Loader and Saver
//!
//! Manages all user-editable settings for the bridge. Loads and saves
//! settings as TOML from the proper cross-platform config path using the
//! [`directories`](https://docs.rs/directories) crate.
//!
//! ## Features
//! - XDG-compliant config discovery and writing (Linux, macOS, Windows)
//! - Robust defaulting if no config file exists
//! - Async load/save for smooth integration with Tokio
//!
//! ## Example
//! ```rust,ignore
//! let config = LinkConfig::load().await?;
//! config.save().await?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::dispatch::registry::MissingHandlerPolicy;
use crate::logging::LoggerConfig;

/// Signal channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Bounded buffer size for queued signals. Emitters get the signal back
    /// instead of blocking when the buffer is full.
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { event_buffer: 64 }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DispatchConfig {
    /// Behavior when a signal arrives for an event with no handler.
    #[serde(default)]
    pub missing_handler: MissingHandlerPolicy,
}

/// Request transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// How long a pending request waits for the node's answer.
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Broadcast buffer for unsolicited node events; lagging subscribers
    /// skip old notifications.
    pub notification_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
            notification_buffer: 64,
        }
    }
}

/// Main configuration struct for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkConfig {
    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggerConfig,
}

impl LinkConfig {
    /// Loads config from TOML file at the XDG-compliant app config dir, or
    /// returns defaults.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    /// Saves config to TOML file at the XDG-compliant app config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "nodelink", "NodeLink")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Returns the config directory (without filename).
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "nodelink", "NodeLink")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = LinkConfig::default();

        assert_eq!(cfg.channel.event_buffer, 64);
        assert_eq!(cfg.dispatch.missing_handler, MissingHandlerPolicy::Warn);
        assert_eq!(cfg.transport.response_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = LinkConfig {
            transport: TransportConfig {
                response_timeout: Duration::from_secs(5),
                notification_buffer: 16,
            },
            ..LinkConfig::default()
        };

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: LinkConfig = toml::from_str(&text).unwrap();

        assert_eq!(back.transport.response_timeout, Duration::from_secs(5));
        assert_eq!(back.transport.notification_buffer, 16);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let back: LinkConfig = toml::from_str(
            r#"
            [dispatch]
            missing_handler = "fail"
            "#,
        )
        .unwrap();

        assert_eq!(back.dispatch.missing_handler, MissingHandlerPolicy::Fail);
        assert_eq!(back.channel.event_buffer, 64);
    }
}

//! Configuration file support for firmlink.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (FIRMLINK_*)
//! 3. Explicit `--config PATH`
//! 4. Local config file (./firmlink.toml)
//! 5. Global config file (~/.config/firmlink/config.toml)

use directories::ProjectDirs;
use firmlink::{Banners, VerifyConfig};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "firmlink.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub port: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
    /// Per-read timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Seconds to wait for a port choice before auto-selecting.
    pub select_timeout_secs: Option<u64>,
}

/// Verification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifySection {
    /// Expected identity banner.
    pub firmware_name: Option<String>,
    /// Expected version banner.
    pub firmware_version: Option<String>,
    /// Handshake budget in seconds.
    pub handshake_timeout_secs: Option<u64>,
    /// Blink markers to sample.
    pub blinks: Option<usize>,
    /// Blink phase budget in seconds; 0 waits indefinitely.
    pub blink_timeout_secs: Option<u64>,
    /// Baud rate of the boot check.
    pub boot_baud: Option<u32>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Verification settings.
    #[serde(default)]
    pub verify: VerifySection,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load the global and local files, then `path` on top (--config flag).
    pub fn load_with_override(path: &Path) -> Self {
        let mut config = Self::load();
        if let Some(explicit) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config.merge(explicit);
        } else {
            warn!(
                "Could not load config from {}, using remaining sources",
                path.display()
            );
        }
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "firmlink").map(|dirs| {
            dirs.config_dir()
                .to_path_buf()
        })
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set values win.
    fn merge(&mut self, other: Self) {
        let conn = &mut self.connection;
        if other
            .connection
            .port
            .is_some()
        {
            conn.port = other
                .connection
                .port;
        }
        conn.baud = other
            .connection
            .baud
            .or(conn.baud);
        conn.timeout_ms = other
            .connection
            .timeout_ms
            .or(conn.timeout_ms);
        conn.select_timeout_secs = other
            .connection
            .select_timeout_secs
            .or(conn.select_timeout_secs);

        let verify = &mut self.verify;
        if other
            .verify
            .firmware_name
            .is_some()
        {
            verify.firmware_name = other
                .verify
                .firmware_name;
        }
        if other
            .verify
            .firmware_version
            .is_some()
        {
            verify.firmware_version = other
                .verify
                .firmware_version;
        }
        verify.handshake_timeout_secs = other
            .verify
            .handshake_timeout_secs
            .or(verify.handshake_timeout_secs);
        verify.blinks = other
            .verify
            .blinks
            .or(verify.blinks);
        verify.blink_timeout_secs = other
            .verify
            .blink_timeout_secs
            .or(verify.blink_timeout_secs);
        verify.boot_baud = other
            .verify
            .boot_baud
            .or(verify.boot_baud);
    }

    /// Verifier settings with configured values applied over the defaults.
    pub fn verify_config(&self) -> VerifyConfig {
        let mut config = VerifyConfig::default();
        let defaults = Banners::default();
        config.banners = Banners {
            name: self
                .verify
                .firmware_name
                .clone()
                .unwrap_or(defaults.name),
            version: self
                .verify
                .firmware_version
                .clone()
                .unwrap_or(defaults.version),
        };
        if let Some(secs) = self
            .verify
            .handshake_timeout_secs
        {
            config.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(blinks) = self
            .verify
            .blinks
        {
            config.blinks_to_verify = blinks;
        }
        if let Some(secs) = self
            .verify
            .blink_timeout_secs
        {
            config.blink_timeout = blink_timeout(secs);
        }
        config
    }
}

/// Blink phase budget for `secs`; 0 means no deadline.
pub fn blink_timeout(secs: u64) -> Duration {
    if secs == 0 {
        Duration::MAX
    } else {
        Duration::from_secs(secs)
    }
}

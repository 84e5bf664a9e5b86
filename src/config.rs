//! Application configuration.
//!
//! Loaded from a TOML file where every field is optional, then overridden by
//! `EPAPER_*` environment variables. Code can also build a config directly:
//!
//! ```rust
//! use epaper_frame::config::{Config, MqttConfig, RotationConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.mqtt.topic_prefix, "epaper");
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"))
//!     .with_rotation(RotationConfig::default().with_hold_secs(60));
//! assert_eq!(config.rotation.hold_secs, 60);
//! ```
//!
//! # File format
//!
//! ```toml
//! [mqtt]
//! host = "broker.local"
//! port = 8883
//! tls_ca_path = "ca.crt"   # relative to this file
//!
//! [storage]
//! database_path = "/var/lib/epaper/drawings.db"
//! qr_image_path = "/var/lib/epaper/qr.png"
//!
//! [rotation]
//! hold_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Database and QR image locations.
    pub storage: StorageConfig,
    /// Panel geometry and output.
    pub display: DisplayConfig,
    /// Rotation timer.
    pub rotation: RotationConfig,
    /// Log filtering.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads `path` (or defaults when `None`) and applies environment
    /// overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but would break the frame at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 {
            return Err(ConfigError::Invalid {
                field: "display.width",
                reason: "must be at least 1",
            });
        }
        if self.display.height == 0 {
            return Err(ConfigError::Invalid {
                field: "display.height",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Reads a TOML file. Relative paths inside it are taken relative to
    /// the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&raw)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parses TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `EPAPER_*` overrides, reading variables through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `EPAPER_MQTT_HOST` | `mqtt.host` |
    /// | `EPAPER_MQTT_PORT` | `mqtt.port` |
    /// | `EPAPER_MQTT_USERNAME` | `mqtt.username` |
    /// | `EPAPER_MQTT_PASSWORD` | `mqtt.password` |
    /// | `EPAPER_DB_PATH` | `storage.database_path` |
    /// | `EPAPER_QR_PATH` | `storage.qr_image_path` |
    /// | `EPAPER_HOLD_SECS` | `rotation.hold_secs` |
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("EPAPER_MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("EPAPER_MQTT_PORT") {
            self.mqtt.port = parse_env("EPAPER_MQTT_PORT", port)?;
        }
        if let Some(username) = lookup("EPAPER_MQTT_USERNAME") {
            self.mqtt.username = username;
        }
        if let Some(password) = lookup("EPAPER_MQTT_PASSWORD") {
            self.mqtt.password = password;
        }
        if let Some(path) = lookup("EPAPER_DB_PATH") {
            self.storage.database_path = path.into();
        }
        if let Some(path) = lookup("EPAPER_QR_PATH") {
            self.storage.qr_image_path = path.into();
        }
        if let Some(secs) = lookup("EPAPER_HOLD_SECS") {
            self.rotation.hold_secs = parse_env("EPAPER_HOLD_SECS", secs)?;
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        if let Some(ca) = self.mqtt.tls_ca_path.as_mut() {
            resolve(ca);
        }
        resolve(&mut self.storage.database_path);
        resolve(&mut self.storage.qr_image_path);
        resolve(&mut self.display.output_path);
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set storage configuration
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set display configuration
    pub fn with_display(mut self, display: DisplayConfig) -> Self {
        self.display = display;
        self
    }

    /// Set rotation configuration
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client id prefix; a random suffix is appended per process
    pub client_id_prefix: String,
    /// Topic prefix, e.g. "epaper" -> "epaper/cmnd/#"
    pub topic_prefix: String,
    /// Username (empty = no auth)
    pub username: String,
    /// Password
    pub password: String,
    /// CA certificate enabling TLS when set
    pub tls_ca_path: Option<PathBuf>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Largest accepted message; drawings arrive as single messages
    pub max_payload_bytes: usize,
    /// First reconnect delay in milliseconds
    pub first_reconnect_delay_ms: u64,
    /// Factor the delay grows by after each failed attempt
    pub reconnect_rate: u32,
    /// Reconnect delay cap in milliseconds
    pub max_reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id_prefix: "epaper-frame".to_string(),
            topic_prefix: "epaper".to_string(),
            username: String::new(),
            password: String::new(),
            tls_ca_path: None,
            keep_alive_secs: 60,
            max_payload_bytes: 1024 * 1024,
            first_reconnect_delay_ms: 1_000,
            reconnect_rate: 2,
            max_reconnect_delay_ms: 60_000,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = prefix.to_string();
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Enable TLS with the given CA certificate
    pub fn with_tls_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_ca_path = Some(path.into());
        self
    }

    /// Set the reconnect backoff parameters
    pub fn with_reconnect(mut self, first_ms: u64, rate: u32, max_ms: u64) -> Self {
        self.first_reconnect_delay_ms = first_ms;
        self.reconnect_rate = rate;
        self.max_reconnect_delay_ms = max_ms;
        self
    }

    /// Whether credentials should be sent
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }

    /// Client id for this process: the prefix plus a random suffix, so two
    /// frames sharing a config never kick each other off the broker.
    pub fn client_id(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.client_id_prefix, &suffix[..8])
    }

    /// Keep-alive as a `Duration`
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

// ============================================================================
// Storage Config
// ============================================================================

/// Where persistent state lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Current QR fallback image
    pub qr_image_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("epaper.db"),
            qr_image_path: PathBuf::from("qr.png"),
        }
    }
}

impl StorageConfig {
    /// Set the database path
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the QR image path
    pub fn with_qr_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.qr_image_path = path.into();
        self
    }
}

// ============================================================================
// Display Config
// ============================================================================

/// Panel geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// PNG file the desktop panel writes to
    pub output_path: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 250,
            height: 122,
            output_path: PathBuf::from("frame.png"),
        }
    }
}

impl DisplayConfig {
    /// Set the panel size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the PNG output path
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
}

// ============================================================================
// Rotation Config
// ============================================================================

/// Rotation timer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// How often the timer wakes, in milliseconds
    pub poll_interval_ms: u64,
    /// Minimum time a drawing stays on screen, in seconds
    pub hold_secs: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            hold_secs: 30,
        }
    }
}

impl RotationConfig {
    /// Set the poll interval
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the hold time
    pub fn with_hold_secs(mut self, secs: u64) -> Self {
        self.hold_secs = secs;
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Hold time as a `chrono::Duration`
    pub fn hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_secs.min(u64::from(u32::MAX)) as i64)
    }
}

// ============================================================================
// Logging Config
// ============================================================================

/// Log filtering. `RUST_LOG` takes precedence when set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic_prefix, "epaper");
        assert!(!config.mqtt.has_auth());
        assert_eq!(config.display.width, 250);
        assert_eq!(config.display.height, 122);
        assert_eq!(config.rotation.hold(), chrono::Duration::seconds(30));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [mqtt]
            host = "broker.local"
            username = "frame"

            [rotation]
            hold_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.mqtt.has_auth());
        assert_eq!(config.rotation.hold_secs, 120);
        assert_eq!(config.rotation.poll_interval_ms, 10_000);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_bad_toml_is_error() {
        let err = Config::from_toml("[mqtt]\nport = \"not a number\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("EPAPER_MQTT_HOST", "10.0.0.5"),
            ("EPAPER_MQTT_PORT", "8883"),
            ("EPAPER_DB_PATH", "/data/frame.db"),
        ]
        .into();
        let mut config = Config::default();
        config
            .apply_env(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.mqtt.host, "10.0.0.5");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.storage.database_path, PathBuf::from("/data/frame.db"));
        assert_eq!(config.storage.qr_image_path, PathBuf::from("qr.png"));
    }

    #[test]
    fn test_env_override_invalid_port() {
        let mut config = Config::default();
        let err = config
            .apply_env(|var| (var == "EPAPER_MQTT_PORT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "EPAPER_MQTT_PORT", .. }));
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.toml");
        std::fs::write(
            &path,
            "[mqtt]\ntls_ca_path = \"ca.crt\"\n[storage]\ndatabase_path = \"/abs/db.sqlite\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.mqtt.tls_ca_path, Some(dir.path().join("ca.crt")));
        assert_eq!(config.storage.database_path, PathBuf::from("/abs/db.sqlite"));
        assert_eq!(config.storage.qr_image_path, dir.path().join("qr.png"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Config::from_file(Path::new("/nonexistent/frame.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_zero_panel_size_rejected() {
        assert!(Config::default().validate().is_ok());

        let config = Config::from_toml("[display]\nwidth = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "display.width",
                ..
            })
        ));

        let config = Config::default().with_display(DisplayConfig::default().with_size(250, 0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "display.height",
                ..
            })
        ));
    }

    #[test]
    fn test_load_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.toml");
        std::fs::write(&path, "[display]\nheight = 0\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_client_id_is_unique() {
        let mqtt = MqttConfig::default();
        let a = mqtt.client_id();
        let b = mqtt.client_id();
        assert!(a.starts_with("epaper-frame-"));
        assert_eq!(a.len(), "epaper-frame-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_mqtt(
                MqttConfig::default()
                    .with_host("h")
                    .with_port(1)
                    .with_auth("u", "p")
                    .with_tls_ca("ca.pem")
                    .with_reconnect(10, 3, 100),
            )
            .with_display(DisplayConfig::default().with_size(296, 128));
        assert_eq!(config.mqtt.host, "h");
        assert_eq!(config.mqtt.reconnect_rate, 3);
        assert_eq!(config.mqtt.tls_ca_path, Some(PathBuf::from("ca.pem")));
        assert_eq!(config.display.width, 296);
    }
}

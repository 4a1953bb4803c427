//! Configuration management for the light-level service
//!
//! TOML configuration with serde defaults for every field, environment
//! variable overrides and a `validate()` pass run before the server starts.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::aggregation::{BucketUnit, ReducerRegistry};
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// Listener and logging settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Measurement store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query service policy and request defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Bucket widths for the socket period keywords
    #[serde(default)]
    pub periods: PeriodConfig,

    /// Line-socket connection handling
    #[serde(default)]
    pub socket: SocketConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Line-socket listen address
    #[serde(default = "default_socket_addr")]
    pub socket_addr: SocketAddr,

    /// Log level (error, warn, info, debug, trace) when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Serve the line socket next to HTTP
    #[serde(default = "default_true")]
    pub socket_enabled: bool,

    /// Allowed CORS origins, empty means any origin
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Device catalog file, relative to `data_dir`
    #[serde(default = "default_devices_file")]
    pub devices_file: String,

    /// Measurement log file, relative to `data_dir`
    #[serde(default = "default_measurements_file")]
    pub measurements_file: String,
}

impl StorageConfig {
    /// Full path of the device catalog
    pub fn devices_path(&self) -> PathBuf {
        self.data_dir.join(&self.devices_file)
    }

    /// Full path of the measurement log
    pub fn measurements_path(&self) -> PathBuf {
        self.data_dir.join(&self.measurements_file)
    }

    /// Storage rooted at `data_dir` with default file names
    pub fn at(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// Query service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Retries after a `StoreUnavailable` failure (0 or 1)
    #[serde(default)]
    pub max_store_retries: u32,

    /// Largest number of buckets a single query may produce
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,

    /// Map HTTP error kinds to 4xx/5xx instead of `200`
    #[serde(default)]
    pub strict_http_status: bool,

    /// Reducer used when a request names none
    #[serde(default = "default_reducer")]
    pub default_reducer: String,

    /// Bucket unit used when a request names none
    #[serde(default = "default_per")]
    pub default_per: BucketUnit,
}

/// Period keyword configuration for the line socket
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeriodConfig {
    /// Bucket unit for `<device>/daily`
    #[serde(default = "default_daily_per")]
    pub daily_per: BucketUnit,

    /// Bucket unit for `<device>/weekly`
    #[serde(default = "default_weekly_per")]
    pub weekly_per: BucketUnit,
}

/// Line-socket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocketConfig {
    /// Close a connection after this many idle seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Longest accepted request line in bytes
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum concurrent connections per client IP
    #[serde(default = "default_max_per_ip")]
    pub max_per_ip: usize,

    /// Disable Nagle's algorithm on accepted sockets
    #[serde(default = "default_true")]
    pub tcp_nodelay: bool,

    /// Set SO_REUSEPORT on the listener
    #[serde(default)]
    pub so_reuseport: bool,
}

// Default value functions
fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_socket_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5555))
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_devices_file() -> String {
    "devices.jsonl".to_string()
}
fn default_measurements_file() -> String {
    "measurements.jsonl".to_string()
}
fn default_reducer() -> String {
    "mean".to_string()
}
fn default_per() -> BucketUnit {
    BucketUnit::Hour
}
fn default_max_buckets() -> usize {
    100_000
}
fn default_daily_per() -> BucketUnit {
    BucketUnit::Hour
}
fn default_weekly_per() -> BucketUnit {
    BucketUnit::Day
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_max_line_length() -> usize {
    64 * 1024
}
fn default_max_connections() -> usize {
    1024
}
fn default_max_per_ip() -> usize {
    64
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            socket_addr: default_socket_addr(),
            log_level: default_log_level(),
            socket_enabled: true,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            devices_file: default_devices_file(),
            measurements_file: default_measurements_file(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_store_retries: 0,
            max_buckets: default_max_buckets(),
            strict_http_status: false,
            default_reducer: default_reducer(),
            default_per: default_per(),
        }
    }
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            daily_per: default_daily_per(),
            weekly_per: default_weekly_per(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_line_length: default_max_line_length(),
            max_connections: default_max_connections(),
            max_per_ip: default_max_per_ip(),
            tcp_nodelay: true,
            so_reuseport: false,
        }
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&contents).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable addresses are ignored and the configured value kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("LUMEN_HTTP_ADDR") {
            if let Ok(a) = addr.parse() {
                self.server.http_addr = a;
            }
        }
        if let Ok(addr) = std::env::var("LUMEN_SOCKET_ADDR") {
            if let Ok(a) = addr.parse() {
                self.server.socket_addr = a;
            }
        }
        if let Ok(data_dir) = std::env::var("LUMEN_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(log_level) = std::env::var("LUMEN_LOG_LEVEL") {
            self.server.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::Configuration(msg.to_string()));

        if self.server.http_addr.port() == 0 {
            return invalid("HTTP port cannot be 0");
        }
        if self.server.socket_enabled {
            if self.server.socket_addr.port() == 0 {
                return invalid("Socket port cannot be 0");
            }
            if self.server.socket_addr == self.server.http_addr {
                return invalid("HTTP and socket listeners cannot share an address");
            }
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            return invalid("Data directory cannot be empty");
        }
        if self.storage.devices_file.is_empty() || self.storage.measurements_file.is_empty() {
            return invalid("Store file names cannot be empty");
        }

        if self.query.max_store_retries > 1 {
            return invalid("max_store_retries must be 0 or 1");
        }
        if self.query.max_buckets == 0 {
            return invalid("max_buckets must be > 0");
        }
        if !ReducerRegistry::builtin().contains(&self.query.default_reducer) {
            return Err(Error::Configuration(format!(
                "Unknown default reducer '{}'",
                self.query.default_reducer
            )));
        }

        if self.socket.idle_timeout_secs == 0 {
            return invalid("Socket idle timeout must be > 0");
        }
        if self.socket.max_line_length == 0 {
            return invalid("Socket max line length must be > 0");
        }
        if self.socket.max_connections == 0 {
            return invalid("Socket max connections must be > 0");
        }
        if self.socket.max_per_ip > self.socket.max_connections {
            return invalid("Socket max_per_ip cannot exceed max_connections");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApplicationConfig::default();
        assert_eq!(config.server.http_addr.port(), 8080);
        assert_eq!(config.server.socket_addr.port(), 5555);
        assert_eq!(config.query.default_reducer, "mean");
        assert_eq!(config.query.default_per, BucketUnit::Hour);
        assert_eq!(config.periods.daily_per, BucketUnit::Hour);
        assert_eq!(config.periods.weekly_per, BucketUnit::Day);
        assert!(!config.query.strict_http_status);
    }

    #[test]
    fn test_config_validation() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ApplicationConfig::from_toml(
            r#"
            [server]
            http_addr = "127.0.0.1:9000"

            [query]
            default_per = "quarter"
            strict_http_status = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.server.socket_addr.port(), 5555);
        assert_eq!(config.query.default_per, BucketUnit::Quarter);
        assert!(config.query.strict_http_status);
        assert_eq!(config.storage.devices_file, "devices.jsonl");
    }

    #[test]
    fn test_unknown_unit_rejected_at_parse() {
        let result = ApplicationConfig::from_toml("[periods]\ndaily_per = \"fortnight\"\n");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_invalid_settings() {
        let mut config = ApplicationConfig::default();
        config.query.max_store_retries = 2;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.query.default_reducer = "mode".to_string();
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.server.socket_addr = config.server.http_addr;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.socket.max_per_ip = config.socket.max_connections + 1;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.socket.idle_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ApplicationConfig::default();
        config.query.max_buckets = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shared_address_allowed_when_socket_disabled() {
        let mut config = ApplicationConfig::default();
        config.server.socket_enabled = false;
        config.server.socket_addr = config.server.http_addr;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig::at("/tmp/lumen");
        assert_eq!(
            storage.devices_path(),
            PathBuf::from("/tmp/lumen/devices.jsonl")
        );
        assert_eq!(
            storage.measurements_path(),
            PathBuf::from("/tmp/lumen/measurements.jsonl")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.toml");

        let mut config = ApplicationConfig::default();
        config.query.default_reducer = "median".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = ApplicationConfig::from_file(&path).unwrap();
        assert_eq!(loaded.query.default_reducer, "median");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("LUMEN_DATA_DIR", "/srv/lumen");
        let config = ApplicationConfig::from_env();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/lumen"));
        std::env::remove_var("LUMEN_DATA_DIR");
    }
}

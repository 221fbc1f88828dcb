//! Configuration management for Minjok Journal services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Current-user cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Journal workflow settings
    #[serde(default)]
    pub journal: JournalConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted request body (paper files and cover images)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables and indexes on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

/// Which object store implementation backs uploads
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Local,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Base URL that public object URLs are built from
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Bucket name for the hosted storage API
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Hosted storage API base, e.g. https://project.example.co/storage/v1
    pub api_base: Option<String>,

    /// Service key sent as a bearer token to the hosted storage API
    pub service_key: Option<String>,

    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret shared with the identity provider for verifying access tokens
    pub jwt_secret: Option<String>,

    /// Token lifetime used when minting tokens locally
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Cookie carrying the access token
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

/// Which profile cache implementation is used
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Redis,
    Disabled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,

    /// How long a resolved user + profile may be reused
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Redis URL for the shared backend
    pub redis_url: Option<String>,

    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JournalConfig {
    /// Minimum gap between two version uploads for the same paper
    #[serde(default = "default_version_cooldown")]
    pub version_cooldown_secs: u64,

    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name recorded on every request span
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Header that carries (and echoes) the request id
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (process wide)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_storage_backend() -> StorageBackend { StorageBackend::Local }
fn default_storage_root() -> String { "./storage".to_string() }
fn default_public_base_url() -> String { "http://localhost:8080/files".to_string() }
fn default_bucket() -> String { "journal".to_string() }
fn default_storage_timeout() -> u64 { 60 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_session_cookie() -> String { "sb-access-token".to_string() }
fn default_request_id_header() -> String { "x-request-id".to_string() }
fn default_cache_backend() -> CacheBackend { CacheBackend::Memory }
fn default_cache_ttl() -> u64 { 5 }
fn default_cache_prefix() -> String { "minjok".to_string() }
fn default_version_cooldown() -> u64 { 5 }
fn default_page_size() -> u64 { 10 }
fn default_max_page_size() -> u64 { 100 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "minjok-journal".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            bucket: default_bucket(),
            api_base: None,
            service_key: None,
            timeout_secs: default_storage_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            session_cookie: default_session_cookie(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: default_cache_ttl(),
            redis_url: None,
            key_prefix: default_cache_prefix(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            version_cooldown_secs: default_version_cooldown(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
            request_id_header: default_request_id_header(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// Cooldown between version uploads on the same paper
    pub fn version_cooldown(&self) -> Duration {
        Duration::from_secs(self.journal.version_cooldown_secs)
    }

    /// Lifetime of a cached user + profile lookup
    pub fn profile_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/minjok".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                auto_migrate: false,
            },
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            cache: CacheSettings::default(),
            journal: JournalConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_cookie, "sb-access-token");
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn test_journal_windows() {
        let config = AppConfig::default();
        assert_eq!(config.version_cooldown(), Duration::from_secs(5));
        assert_eq!(config.profile_cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/minjok");
    }
}

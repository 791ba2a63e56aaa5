use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub rate_limit: RateLimitConfig,

    pub ingest: IngestConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 0)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/jobhound.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 0,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Trusted proxy IP addresses allowed to provide forwarded client IP headers.
    ///
    /// When empty, forwarded headers are ignored for rate-limiting identity and
    /// the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,

    /// Echo internal error detail in 5xx bodies. Development only.
    pub expose_error_details: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            trusted_proxy_ips: Vec::new(),
            expose_error_details: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens. `JWT_SECRET` overrides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    pub token_ttl_hours: u64,

    pub security: SecurityConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
            security: SecurityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

/// A fixed-window admission policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowPolicy {
    pub max_requests: u32,

    pub window_seconds: u64,
}

impl WindowPolicy {
    #[must_use]
    pub const fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Register and login.
    pub auth: WindowPolicy,

    /// Job listing, detail and stats.
    pub public: WindowPolicy,

    /// Scraper endpoints.
    pub ingest: WindowPolicy,

    /// How often elapsed windows are swept from memory.
    pub purge_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: WindowPolicy::new(5, 15 * 60),
            public: WindowPolicy::new(100, 15 * 60),
            ingest: WindowPolicy::new(50, 60),
            purge_interval_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Automation endpoint that starts a scraping run. Runs are only
    /// acknowledged when unset.
    pub trigger_webhook_url: Option<String>,

    pub trigger_timeout_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            trigger_webhook_url: None,
            trigger_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ingest: IngestConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("JWT_SECRET")
            && !secret.is_empty()
        {
            self.auth.jwt_secret = Some(secret);
        }

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            self.general.database_path = url;
        }

        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("jobhound").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".jobhound").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("Token signing secret is not configured (set JWT_SECRET or auth.jwt_secret)");
        }

        if self.auth.token_ttl_hours == 0 {
            anyhow::bail!("auth.token_ttl_hours must be > 0");
        }

        for (name, policy) in [
            ("auth", self.rate_limit.auth),
            ("public", self.rate_limit.public),
            ("ingest", self.rate_limit.ingest),
        ] {
            if policy.max_requests == 0 || policy.window_seconds == 0 {
                anyhow::bail!("rate_limit.{name} must allow at least one request per non-empty window");
            }
        }

        if let Some(url) = &self.ingest.trigger_webhook_url {
            url::Url::parse(url).context("Invalid ingest.trigger_webhook_url")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.rate_limit.auth, WindowPolicy::new(5, 900));
        assert_eq!(config.rate_limit.public, WindowPolicy::new(100, 900));
        assert_eq!(config.rate_limit.ingest, WindowPolicy::new(50, 60));
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some(String::new());
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some("s3cret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_webhook() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("s3cret".to_string());
        config.ingest.trigger_webhook_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [rate_limit.ingest]
            max_requests = 10
            window_seconds = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.rate_limit.ingest, WindowPolicy::new(10, 30));
        assert_eq!(config.rate_limit.auth, WindowPolicy::new(5, 900));
    }

    #[test]
    fn test_secret_not_serialized_when_absent() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[rate_limit.public]"));
        assert!(!toml_str.contains("jwt_secret"));
    }
}

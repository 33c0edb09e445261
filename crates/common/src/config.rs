//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Credential vault configuration.
    pub vault: VaultConfig,
    /// Dispatcher configuration.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Lifecycle cleanup configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Provider API endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Cron trigger configuration.
    #[serde(default)]
    pub cron: CronConfig,
    /// Usage quotas per role.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timeout for non-cron requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Credential vault configuration.
#[derive(Clone, Deserialize)]
pub struct VaultConfig {
    /// 32-byte key as 64 hex characters. Other strings are stretched with SHA-256.
    pub encryption_key: String,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Whether the in-process interval trigger runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between dispatcher runs.
    #[serde(default = "default_dispatch_interval")]
    pub interval_secs: u64,
    /// Maximum schedules claimed per run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u64,
    /// Maximum concurrent publishes per run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout for a single provider publish call.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
    /// Rows stuck in `publishing` longer than this are reclaimed. `None` disables reclaim.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: Option<u64>,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_dispatch_interval(),
            batch_limit: default_batch_limit(),
            max_concurrency: default_max_concurrency(),
            publish_timeout_secs: default_publish_timeout(),
            stale_after_secs: default_stale_after(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for transient publish failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries before a schedule fails permanently.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Delay before the first retry. Zero retries on the next dispatcher pass.
    #[serde(default)]
    pub initial_delay_secs: u64,
    /// Multiplier applied per retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound for the retry delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_secs: 0,
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay(),
        }
    }
}

/// Lifecycle cleanup configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Whether the in-process cleanup trigger runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between cleanup runs.
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval(),
        }
    }
}

/// Provider API endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Facebook Graph API base URL (shared by Facebook Pages and Instagram).
    #[serde(default = "default_graph_url")]
    pub graph_api_url: String,
    /// Graph API version segment, e.g. `v21.0`.
    #[serde(default = "default_graph_version")]
    pub graph_api_version: String,
    /// Zalo OA API base URL.
    #[serde(default = "default_zalo_url")]
    pub zalo_api_url: String,
    /// HTTP timeout for provider requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Status checks allowed across all Instagram containers of one publish.
    #[serde(default = "default_container_poll_attempts")]
    pub instagram_poll_attempts: u32,
    /// Delay between Instagram container polls.
    #[serde(default = "default_container_poll_interval")]
    pub instagram_poll_interval_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            graph_api_url: default_graph_url(),
            graph_api_version: default_graph_version(),
            zalo_api_url: default_zalo_url(),
            http_timeout_secs: default_http_timeout(),
            instagram_poll_attempts: default_container_poll_attempts(),
            instagram_poll_interval_ms: default_container_poll_interval(),
        }
    }
}

/// Cron trigger configuration.
#[derive(Clone, Default, Deserialize)]
pub struct CronConfig {
    /// Shared secret expected as a bearer token on trigger endpoints.
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for CronConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Daily and monthly ceilings for one role. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoleLimits {
    /// AI requests per day.
    pub ai_daily: i64,
    /// AI requests per month.
    pub ai_monthly: i64,
    /// Post creations per day.
    pub posts_daily: i64,
    /// Post creations per month.
    pub posts_monthly: i64,
}

/// Usage quotas per role.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Free tier.
    #[serde(default = "default_free_limits")]
    pub free: RoleLimits,
    /// Professional tier.
    #[serde(default = "default_professional_limits")]
    pub professional: RoleLimits,
    /// Enterprise tier.
    #[serde(default = "default_enterprise_limits")]
    pub enterprise: RoleLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            free: default_free_limits(),
            professional: default_professional_limits(),
            enterprise: default_enterprise_limits(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_dispatch_interval() -> u64 {
    60
}

const fn default_batch_limit() -> u64 {
    50
}

const fn default_max_concurrency() -> usize {
    5
}

const fn default_publish_timeout() -> u64 {
    120
}

#[allow(clippy::unnecessary_wraps)]
const fn default_stale_after() -> Option<u64> {
    Some(900)
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay() -> u64 {
    3600
}

const fn default_cleanup_interval() -> u64 {
    86400
}

fn default_graph_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_version() -> String {
    "v21.0".to_string()
}

fn default_zalo_url() -> String {
    "https://openapi.zalo.me/v2.0".to_string()
}

const fn default_http_timeout() -> u64 {
    30
}

const fn default_container_poll_attempts() -> u32 {
    20
}

const fn default_container_poll_interval() -> u64 {
    3000
}

const fn default_free_limits() -> RoleLimits {
    RoleLimits {
        ai_daily: 10,
        ai_monthly: 100,
        posts_daily: 5,
        posts_monthly: 50,
    }
}

const fn default_professional_limits() -> RoleLimits {
    RoleLimits {
        ai_daily: 100,
        ai_monthly: 2000,
        posts_daily: 50,
        posts_monthly: 1000,
    }
}

const fn default_enterprise_limits() -> RoleLimits {
    RoleLimits {
        ai_daily: -1,
        ai_monthly: -1,
        posts_daily: -1,
        posts_monthly: -1,
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SOCIALCAST_ENV`)
    /// 3. Environment variables with `SOCIALCAST__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SOCIALCAST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SOCIALCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SOCIALCAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timing settings that would let one publish outlive its claim or
    /// its own timeout.
    ///
    /// - `stale_after_secs` must be at least twice `publish_timeout_secs`, so a
    ///   row is never reclaimed while its publish may still be running.
    /// - Instagram container polling must fit inside `publish_timeout_secs`.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let publish_timeout = self.dispatcher.publish_timeout_secs;
        if publish_timeout == 0 {
            return Err(config::ConfigError::Message(
                "dispatcher.publish_timeout_secs must be positive".to_string(),
            ));
        }

        if let Some(stale_after) = self.dispatcher.stale_after_secs {
            if stale_after < publish_timeout.saturating_mul(2) {
                return Err(config::ConfigError::Message(format!(
                    "dispatcher.stale_after_secs ({stale_after}) must be at least twice \
                     dispatcher.publish_timeout_secs ({publish_timeout})"
                )));
            }
        }

        let poll_budget_ms = u64::from(self.providers.instagram_poll_attempts)
            .saturating_mul(self.providers.instagram_poll_interval_ms);
        if poll_budget_ms >= publish_timeout.saturating_mul(1000) {
            return Err(config::ConfigError::Message(format!(
                "Instagram container polling ({poll_budget_ms} ms) must fit inside \
                 dispatcher.publish_timeout_secs ({publish_timeout})"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        config::Config::builder()
            .set_override("database.url", "postgres://localhost/socialcast")
            .unwrap()
            .set_override("vault.encryption_key", "k")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = minimal();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.dispatcher.retry.max_retries, 3);
        assert_eq!(config.dispatcher.retry.initial_delay_secs, 0);
        assert_eq!(config.dispatcher.stale_after_secs, Some(900));
        assert_eq!(config.limits.enterprise.ai_daily, -1);
        assert!(config.cron.secret.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_stale_window_must_cover_publish_timeout() {
        let mut config = minimal();
        config.dispatcher.publish_timeout_secs = 600;
        config.dispatcher.stale_after_secs = Some(900);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("stale_after_secs"), "{err}");

        config.dispatcher.stale_after_secs = None;
        config.validate().unwrap();
    }

    #[test]
    fn test_instagram_polling_must_fit_publish_timeout() {
        let mut config = minimal();
        config.dispatcher.publish_timeout_secs = 30;
        config.providers.instagram_poll_attempts = 10;
        config.providers.instagram_poll_interval_ms = 3000;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Instagram container polling"), "{err}");

        config.providers.instagram_poll_attempts = 5;
        config.validate().unwrap();
    }

    #[test]
    fn test_vault_config_debug_is_redacted() {
        let vault = VaultConfig {
            encryption_key: "super-secret".to_string(),
        };
        let rendered = format!("{vault:?}");
        assert!(!rendered.contains("super-secret"));
    }
}

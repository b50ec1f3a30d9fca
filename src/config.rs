use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub scraper: ScraperConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64,
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub chrome_path: Option<String>,
    /// How long the shared browser may sit idle before the driver gives up
    /// on it. Kept high: the browser is meant to live for the process.
    pub browser_idle_timeout: u64,
    /// Full page-load bound, seconds.
    pub page_load_timeout: u64,
    /// Bound on locating the result card for a reference number, seconds.
    pub card_lookup_timeout: u64,
    /// Bound on the details-page marker appearing, seconds.
    pub details_timeout: u64,
    /// Bound on award-tab content rendering after activation, seconds.
    pub award_settle_timeout: u64,
    /// Interval between DOM polls inside a bounded wait, milliseconds.
    pub poll_interval_ms: u64,
    /// Skip images/stylesheets/fonts during navigation.
    pub block_static_resources: bool,
}

impl ScraperConfig {
    pub fn page_load(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }

    pub fn card_lookup(&self) -> Duration {
        Duration::from_secs(self.card_lookup_timeout)
    }

    pub fn details_ready(&self) -> Duration {
        Duration::from_secs(self.details_timeout)
    }

    pub fn award_settle(&self) -> Duration {
        Duration::from_secs(self.award_settle_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration, optionally forcing the run mode instead of
    /// reading it from `RUN_MODE`.
    pub fn load(run_mode: Option<String>) -> Result<Self, ConfigError> {
        let run_mode = run_mode
            .or_else(|| env::var("RUN_MODE").ok())
            .unwrap_or_else(|| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "ETIMAD_"
            .add_source(Environment::with_prefix("ETIMAD").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if self.auth.secret_key.len() < 32 {
            return Err(ConfigError::Message("Auth secret_key must be at least 32 characters".into()));
        }

        if self.scraper.page_load_timeout == 0
            || self.scraper.card_lookup_timeout == 0
            || self.scraper.details_timeout == 0
            || self.scraper.award_settle_timeout == 0
        {
            return Err(ConfigError::Message("Scraper timeouts must be greater than 0".into()));
        }

        if self.scraper.poll_interval_ms == 0 {
            return Err(ConfigError::Message("Scraper poll_interval_ms must be greater than 0".into()));
        }

        if self.scraper.poll_interval_ms > self.scraper.card_lookup_timeout * 1000 {
            return Err(ConfigError::Message(
                "Scraper poll_interval_ms cannot exceed the card lookup timeout".into(),
            ));
        }

        if self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        if !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::Message("Metrics endpoint must start with '/'".into()));
        }

        Ok(())
    }
}

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub mongo_collection: String,
    pub redis_uri: String,
    pub session_ttl_seconds: u64,
    pub question_timeout_ms: u64,
    pub batch_size: usize,
    pub bind_addr: String,
    pub cookie_secure: bool,
    pub metrics_auth: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "trivia".to_string(),
            mongo_collection: "questions".to_string(),
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            session_ttl_seconds: 86_400,
            question_timeout_ms: 1_000,
            batch_size: 5,
            bind_addr: "0.0.0.0:8080".to_string(),
            cookie_secure: false,
            metrics_auth: "admin:changeme".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let config = Config {
            mongo_uri: string_setting(&settings, "database.mongo_uri", "MONGO_URI")
                .unwrap_or(defaults.mongo_uri),
            mongo_database: string_setting(&settings, "database.mongo_database", "MONGO_DATABASE")
                .unwrap_or(defaults.mongo_database),
            mongo_collection: string_setting(
                &settings,
                "database.mongo_collection",
                "MONGO_COLLECTION",
            )
            .unwrap_or(defaults.mongo_collection),
            redis_uri: string_setting(&settings, "redis.uri", "REDIS_URI")
                .unwrap_or(defaults.redis_uri),
            session_ttl_seconds: parsed_setting(&settings, "session.ttl_seconds", "SESSION_TTL_SECONDS")?
                .unwrap_or(defaults.session_ttl_seconds),
            question_timeout_ms: parsed_setting(
                &settings,
                "questions.timeout_ms",
                "QUESTION_TIMEOUT_MS",
            )?
            .unwrap_or(defaults.question_timeout_ms),
            batch_size: parsed_setting(&settings, "questions.batch_size", "BATCH_SIZE")?
                .unwrap_or(defaults.batch_size),
            bind_addr: string_setting(&settings, "server.bind_addr", "BIND_ADDR")
                .unwrap_or(defaults.bind_addr),
            cookie_secure: parsed_setting(&settings, "session.cookie_secure", "COOKIE_SECURE")?
                .unwrap_or(defaults.cookie_secure),
            metrics_auth: string_setting(&settings, "metrics.auth", "METRICS_AUTH")
                .unwrap_or(defaults.metrics_auth),
        };

        if config.batch_size == 0 {
            return Err(config::ConfigError::Message(
                "BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn question_timeout(&self) -> Duration {
        Duration::from_millis(self.question_timeout_ms)
    }
}

/// Settings file / `APP__` value first, then the plain environment variable.
fn string_setting(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| env::var(env_key).ok())
        .filter(|value| !value.is_empty())
}

fn parsed_setting<T: FromStr>(
    settings: &config::Config,
    key: &str,
    env_key: &str,
) -> Result<Option<T>, config::ConfigError> {
    match string_setting(settings, key, env_key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            config::ConfigError::Message(format!("Invalid value for {}: {}", env_key, raw))
        }),
    }
}

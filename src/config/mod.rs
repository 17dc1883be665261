//! Configuration management
//!
//! Configuration for the FloodWatch API is loaded from:
//! - a `config.yml` file
//! - environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "FLOODWATCH";

/// Development-only signing secret, replaced in any real deployment
pub const DEFAULT_JWT_SECRET: &str = "floodwatch-dev-secret-change-me";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token and OTP lifetimes
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outbound email
    #[serde(default)]
    pub email: EmailConfig,
    /// External prediction service
    #[serde(default)]
    pub prediction: PredictionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/floodwatch.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access and reset tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime for users with a verified email
    #[serde(default = "default_verified_token_ttl")]
    pub verified_token_ttl_secs: u64,
    /// Access token lifetime for users still pending verification
    #[serde(default = "default_unverified_token_ttl")]
    pub unverified_token_ttl_secs: u64,
    /// Refresh token lifetime
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: u64,
    /// One-time code lifetime
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: u64,
    /// Password-reset token lifetime
    #[serde(default = "default_password_reset_ttl")]
    pub password_reset_token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            verified_token_ttl_secs: default_verified_token_ttl(),
            unverified_token_ttl_secs: default_unverified_token_ttl(),
            refresh_token_ttl_days: default_refresh_token_ttl_days(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            password_reset_token_ttl_secs: default_password_reset_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_verified_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_unverified_token_ttl() -> u64 {
    5 * 60
}

fn default_refresh_token_ttl_days() -> u64 {
    7
}

fn default_otp_ttl_minutes() -> u64 {
    5
}

fn default_password_reset_ttl() -> u64 {
    5000
}

/// Email (SMTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Send real mail over SMTP; when false, messages are only logged
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Sender display name
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "no-reply@floodwatch.local".to_string()
}

fn default_from_name() -> String {
    "FloodWatch".to_string()
}

/// Prediction service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Model-serving endpoint
    #[serde(default = "default_prediction_url")]
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_prediction_timeout")]
    pub timeout_secs: u64,
    /// Persist results for authenticated callers
    #[serde(default = "default_save_history")]
    pub save_history: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            url: default_prediction_url(),
            timeout_secs: default_prediction_timeout(),
            save_history: default_save_history(),
        }
    }
}

fn default_prediction_url() -> String {
    "https://flood-prediction-model-production.up.railway.app/predict".to_string()
}

fn default_prediction_timeout() -> u64 {
    30
}

fn default_save_history() -> bool {
    true
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `FLOODWATCH_<SECTION>_<FIELD>`:
    /// - FLOODWATCH_SERVER_HOST / _PORT / _CORS_ORIGIN
    /// - FLOODWATCH_DATABASE_DRIVER / _URL
    /// - FLOODWATCH_AUTH_JWT_SECRET and the `*_TTL_*` lifetimes
    /// - FLOODWATCH_EMAIL_ENABLED / _SMTP_HOST / _SMTP_PORT / _SMTP_USERNAME /
    ///   _SMTP_PASSWORD / _FROM_ADDRESS / _FROM_NAME
    /// - FLOODWATCH_PREDICTION_URL / _TIMEOUT_SECS / _SAVE_HISTORY
    ///
    /// Values that fail to parse are ignored.
    pub fn load_with_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        let lifetimes = [
            ("auth.verified_token_ttl_secs", self.auth.verified_token_ttl_secs),
            ("auth.unverified_token_ttl_secs", self.auth.unverified_token_ttl_secs),
            ("auth.refresh_token_ttl_days", self.auth.refresh_token_ttl_days),
            ("auth.otp_ttl_minutes", self.auth.otp_ttl_minutes),
            ("auth.password_reset_token_ttl_secs", self.auth.password_reset_token_ttl_secs),
        ];
        if let Some((name, _)) = lifetimes.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                name
            )));
        }
        if self.email.enabled && self.email.smtp_host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "email.smtp_host is required when email is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the signing secret is still the built-in development value
    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        if let Some(host) = env_var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(origin) = env_var("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        // Database
        if let Some(driver) = env_var("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Some(url) = env_var("DATABASE_URL") {
            self.database.url = url;
        }

        // Auth
        if let Some(secret) = env_var("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = env_parse("AUTH_VERIFIED_TOKEN_TTL_SECS") {
            self.auth.verified_token_ttl_secs = ttl;
        }
        if let Some(ttl) = env_parse("AUTH_UNVERIFIED_TOKEN_TTL_SECS") {
            self.auth.unverified_token_ttl_secs = ttl;
        }
        if let Some(ttl) = env_parse("AUTH_REFRESH_TOKEN_TTL_DAYS") {
            self.auth.refresh_token_ttl_days = ttl;
        }
        if let Some(ttl) = env_parse("AUTH_OTP_TTL_MINUTES") {
            self.auth.otp_ttl_minutes = ttl;
        }
        if let Some(ttl) = env_parse("AUTH_PASSWORD_RESET_TOKEN_TTL_SECS") {
            self.auth.password_reset_token_ttl_secs = ttl;
        }

        // Email
        if let Some(enabled) = env_parse("EMAIL_ENABLED") {
            self.email.enabled = enabled;
        }
        if let Some(host) = env_var("EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Some(port) = env_parse("EMAIL_SMTP_PORT") {
            self.email.smtp_port = port;
        }
        if let Some(username) = env_var("EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Some(password) = env_var("EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Some(from) = env_var("EMAIL_FROM_ADDRESS") {
            self.email.from_address = from;
        }
        if let Some(name) = env_var("EMAIL_FROM_NAME") {
            self.email.from_name = name;
        }

        // Prediction
        if let Some(url) = env_var("PREDICTION_URL") {
            self.prediction.url = url;
        }
        if let Some(timeout) = env_parse("PREDICTION_TIMEOUT_SECS") {
            self.prediction.timeout_secs = timeout;
        }
        if let Some(save) = env_parse("PREDICTION_SAVE_HISTORY") {
            self.prediction.save_history = save;
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|value| value.trim().parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ALL_ENV_KEYS: &[&str] = &[
    "FLOODWATCH_SERVER_HOST",
    "FLOODWATCH_SERVER_PORT",
    "FLOODWATCH_SERVER_CORS_ORIGIN",
    "FLOODWATCH_DATABASE_DRIVER",
    "FLOODWATCH_DATABASE_URL",
    "FLOODWATCH_AUTH_JWT_SECRET",
    "FLOODWATCH_AUTH_VERIFIED_TOKEN_TTL_SECS",
    "FLOODWATCH_AUTH_UNVERIFIED_TOKEN_TTL_SECS",
    "FLOODWATCH_AUTH_REFRESH_TOKEN_TTL_DAYS",
    "FLOODWATCH_AUTH_OTP_TTL_MINUTES",
    "FLOODWATCH_AUTH_PASSWORD_RESET_TOKEN_TTL_SECS",
    "FLOODWATCH_EMAIL_ENABLED",
    "FLOODWATCH_EMAIL_SMTP_HOST",
    "FLOODWATCH_EMAIL_SMTP_PORT",
    "FLOODWATCH_PREDICTION_URL",
    "FLOODWATCH_PREDICTION_TIMEOUT_SECS",
    "FLOODWATCH_PREDICTION_SAVE_HISTORY",
];

#[cfg(test)]
fn clear_env() {
    for key in ALL_ENV_KEYS {
        std::env::remove_var(key);
    }
}

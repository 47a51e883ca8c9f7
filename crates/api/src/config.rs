//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SANITY_PROJECT_ID` - Sanity project ID (falls back to `SANITY_STUDIO_PROJECT_ID`)
//! - `SANITY_WRITE_TOKEN` - Sanity API token with write access to the dataset
//!
//! ## Optional
//! - `SANITY_DATASET` - Dataset name (falls back to `SANITY_STUDIO_DATASET`, default: production)
//! - `SANITY_API_VERSION` - Content Lake API version (default: 2024-03-01)
//! - `SANITY_API_HOST` - API base URL (default: `https://<project>.api.sanity.io`)
//! - `SANITY_TIMEOUT_SECS` - HTTP timeout for Sanity calls (default: 30)
//! - `CORS_ALLOWED_ORIGIN` - Value of `Access-Control-Allow-Origin` (default: *)
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 8787)
//! - `LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate, 0.0 to 1.0 (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MAX_DATASET_LENGTH: usize = 64;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Stock service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Value sent in `Access-Control-Allow-Origin`
    pub cors_allowed_origin: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Sanity Content Lake configuration
    pub sanity: SanityConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry performance traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Sanity Content Lake configuration.
///
/// Implements `Debug` manually to redact the write token.
#[derive(Clone)]
pub struct SanityConfig {
    /// Project ID (e.g., `5gg7e1t8`)
    pub project_id: String,
    /// Dataset name (e.g., `production`)
    pub dataset: String,
    /// API version date (e.g., `2024-03-01`)
    pub api_version: String,
    /// API base URL, normally `https://<project>.api.sanity.io`
    pub api_host: Url,
    /// Token with write access to the dataset
    pub token: SecretString,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for SanityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanityConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("api_host", &self.api_host.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&EnvLookup::Process)
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_lookup(env: &EnvLookup) -> Result<Self, ConfigError> {
        let host = env
            .get_or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = env
            .get_or_default("API_PORT", "8787")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;
        let cors_allowed_origin = env.get_or_default("CORS_ALLOWED_ORIGIN", "*");
        if axum::http::HeaderValue::from_str(&cors_allowed_origin).is_err() {
            return Err(ConfigError::InvalidEnvVar(
                "CORS_ALLOWED_ORIGIN".to_string(),
                "must be a valid header value".to_string(),
            ));
        }
        let log_format = parse_log_format(&env.get_or_default("LOG_FORMAT", "text"))?;

        let sanity = SanityConfig::from_lookup(env)?;

        let sentry_sample_rate = parse_rate(env, "SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate = parse_rate(env, "SENTRY_TRACES_SAMPLE_RATE", "0.0")?;

        Ok(Self {
            host,
            port,
            cors_allowed_origin,
            log_format,
            sanity,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SanityConfig {
    /// Load only the Sanity settings (used by the CLI).
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&EnvLookup::Process)
    }

    fn from_lookup(env: &EnvLookup) -> Result<Self, ConfigError> {
        let project_id = env
            .get("SANITY_PROJECT_ID")
            .or_else(|| env.get("SANITY_STUDIO_PROJECT_ID"))
            .ok_or_else(|| ConfigError::MissingEnvVar("SANITY_PROJECT_ID".to_string()))?;
        validate_project_id(&project_id)?;

        let dataset = env
            .get("SANITY_DATASET")
            .or_else(|| env.get("SANITY_STUDIO_DATASET"))
            .unwrap_or_else(|| "production".to_string());
        validate_dataset(&dataset)?;

        let api_version = env.get_or_default("SANITY_API_VERSION", "2024-03-01");
        validate_api_version(&api_version)?;

        let api_host = env
            .get("SANITY_API_HOST")
            .unwrap_or_else(|| format!("https://{project_id}.api.sanity.io"));
        let api_host = Url::parse(&api_host).map_err(|e| {
            ConfigError::InvalidEnvVar("SANITY_API_HOST".to_string(), e.to_string())
        })?;

        let timeout_secs = env
            .get_or_default("SANITY_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SANITY_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let token = env
            .get("SANITY_WRITE_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("SANITY_WRITE_TOKEN".to_string()))?;
        validate_secret_strength(&token, "SANITY_WRITE_TOKEN")?;

        Ok(Self {
            project_id,
            dataset,
            api_version,
            api_host,
            token: SecretString::from(token),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Variable Sources
// =============================================================================

/// Where configuration values are read from.
#[derive(Debug, Clone)]
pub enum EnvLookup {
    /// The process environment.
    Process,
    /// A fixed set of values.
    Map(HashMap<String, String>),
}

impl EnvLookup {
    /// Build a lookup from key/value pairs.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Get a variable, treating empty values as unset.
    fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            Self::Process => std::env::var(key).ok(),
            Self::Map(map) => map.get(key).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_log_format(value: &str) -> Result<LogFormat, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "text" | "pretty" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar(
            "LOG_FORMAT".to_string(),
            format!("expected 'text' or 'json', got '{other}'"),
        )),
    }
}

fn parse_rate(env: &EnvLookup, key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate = env
        .get_or_default(key, default)
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Project IDs are lowercase alphanumerics (and dashes); they become part of
/// the API hostname.
fn validate_project_id(value: &str) -> Result<(), ConfigError> {
    if value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "SANITY_PROJECT_ID".to_string(),
            "must contain only a-z, 0-9 and '-'".to_string(),
        ))
    }
}

fn validate_dataset(value: &str) -> Result<(), ConfigError> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid_chars && value.len() <= MAX_DATASET_LENGTH {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "SANITY_DATASET".to_string(),
            format!("must be at most {MAX_DATASET_LENGTH} chars of a-z, 0-9, '_' and '-'"),
        ))
    }
}

/// Accepts `1`, `X` (experimental) or a `YYYY-MM-DD` date.
fn validate_api_version(value: &str) -> Result<(), ConfigError> {
    let bytes = value.as_bytes();
    let is_date = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if is_date || value == "1" || value == "X" {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "SANITY_API_VERSION".to_string(),
            format!("expected YYYY-MM-DD, got '{value}'"),
        ))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    // Issued tokens are plain alphanumerics, so a pattern inside one is chance.
    let hand_written = !secret.chars().all(|c| c.is_ascii_alphanumeric());

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.starts_with(pattern) || (hand_written && lower.contains(pattern)) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token generated by Sanity."
            ),
        ));
    }

    Ok(())
}

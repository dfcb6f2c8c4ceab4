//! Application configuration.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Uploaded media configuration.
    #[serde(default)]
    pub media: MediaConfig,
    /// SMS gateway configuration. `None` logs codes instead of sending them.
    #[serde(default)]
    pub sms: Option<SmsConfig>,
    /// Phone verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
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
    /// Public URL of this instance.
    pub url: String,
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

/// Media (profile pictures, gift images) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded files are written to.
    #[serde(default = "default_media_dir")]
    pub storage_dir: String,
    /// URL path prefix the files are served under.
    #[serde(default = "default_media_url_prefix")]
    pub url_prefix: String,
    /// Longest side of a stored image, in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// JPEG quality used when re-encoding.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Twilio SMS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// Twilio account SID.
    pub account_sid: String,
    /// Twilio auth token.
    pub auth_token: String,
    /// Sender phone number (E.164).
    pub from_number: String,
    /// API base URL, overridable for testing.
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,
}

/// Phone verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Minutes a verification code stays valid.
    #[serde(default = "default_code_ttl_minutes")]
    pub code_ttl_minutes: i64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_media_dir(),
            url_prefix: default_media_url_prefix(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: default_code_ttl_minutes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_media_url_prefix() -> String {
    "/media".to_string()
}

const fn default_max_dimension() -> u32 {
    1080
}

const fn default_jpeg_quality() -> u8 {
    85
}

const fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}

const fn default_code_ttl_minutes() -> i64 {
    10
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (via dotenvy, if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `GIFTED_ENV`)
    /// 4. Environment variables with `GIFTED__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("GIFTED_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("GIFTED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub flows: FlowConfig,
    pub extractor: ExtractorConfig,
    pub qr: QrConfig,
    pub drivers: DriversConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// When false, sessions are kept in memory only.
    pub enabled: bool,
    pub user: String,
    #[serde(skip_serializing, default = "default_db_password")]
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    pub database: String,
}

/// Outbound messaging and webhook verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhatsAppConfig {
    /// Base URL of the messaging API. Empty means log-only delivery.
    pub api_base_url: String,
    pub phone_number_id: String,
    #[serde(skip_serializing, default = "empty_secret")]
    pub access_token: SecretString,
    /// HMAC secret for `X-Hub-Signature-256`. Empty disables verification.
    #[serde(skip_serializing, default = "empty_secret")]
    pub app_secret: SecretString,
    #[serde(skip_serializing, default = "empty_secret")]
    pub verify_token: SecretString,
}

/// Tunables for the conversational flows and their background workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
    pub nearby_radius_km: f64,
    pub max_driver_results: usize,
    pub extraction_max_attempts: u32,
    pub extraction_poll_interval_seconds: u64,
    pub dedup_retention_seconds: i64,
    pub lock_prune_interval_seconds: u64,
    /// Insurance base premium per month, in RWF.
    pub base_monthly_premium: u64,
    /// COMESA yellow-card surcharge per month, in RWF.
    pub comesa_monthly_surcharge: u64,
    /// Offset of the users' local time from UTC. Kigali is UTC+2.
    pub utc_offset_minutes: i32,
}

/// Where the in-memory driver locator gets its positions.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DriversConfig {
    /// JSON file of driver positions loaded at startup. Empty starts with
    /// no drivers.
    pub seed_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExtractorConfig {
    /// Document extraction endpoint. Empty disables the extraction worker.
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrConfig {
    /// Renderer URL; the USSD string is passed as the `data` query parameter.
    pub renderer_url: String,
}

impl Config {
    /// Load configuration from environment variables, with defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            // Override with environment variables using `CHATFLOWS__` prefix and `__` separator
            // e.g., CHATFLOWS__FLOWS__NEARBY_RADIUS_KM="5"
            .add_source(
                config::Environment::with_prefix("CHATFLOWS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the flows cannot run with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.flows.nearby_radius_km <= 0.0 {
            return Err(config::ConfigError::Message(
                "flows.nearby_radius_km must be positive".to_string(),
            ));
        }
        if self.flows.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(config::ConfigError::Message(
                "flows.utc_offset_minutes must be within one day".to_string(),
            ));
        }
        if self.flows.extraction_max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "flows.extraction_max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("whatsapp.api_base_url", &self.whatsapp.api_base_url),
            ("extractor.endpoint", &self.extractor.endpoint),
            ("qr.renderer_url", &self.qr.renderer_url),
        ] {
            if !value.is_empty() && url::Url::parse(value).is_err() {
                return Err(config::ConfigError::Message(format!(
                    "{name} is not a valid URL: {value}"
                )));
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    /// Constructs the database connection string.
    pub fn connection_string(&self) -> SecretString {
        SecretString::from(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database
        ))
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_db_password() -> SecretString {
    SecretString::from("password".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

// Default values for the database configuration
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user: "postgres".to_string(),
            password: default_db_password(),
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
        }
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            phone_number_id: String::new(),
            access_token: empty_secret(),
            app_secret: empty_secret(),
            verify_token: empty_secret(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            nearby_radius_km: 5.0,
            max_driver_results: 9,
            extraction_max_attempts: 3,
            extraction_poll_interval_seconds: 5,
            dedup_retention_seconds: 86_400,
            lock_prune_interval_seconds: 300,
            base_monthly_premium: 12_000,
            comesa_monthly_surcharge: 4_000,
            utc_offset_minutes: 120,
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            renderer_url: "https://api.qrserver.com/v1/create-qr-code/".to_string(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use serde to serialize to pretty JSON
        // Secrets are skipped via #[serde(skip_serializing)]
        match serde_json::to_string_pretty(&self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "Error serializing config"),
        }
    }
}

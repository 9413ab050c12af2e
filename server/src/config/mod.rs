use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::payment::phonepe::DEFAULT_PHONEPE_HOST;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_BASE_URL: &str = "http://localhost:3001";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayConfig {
    Razorpay {
        key_id: String,
        key_secret: String,
    },
    PhonePe {
        merchant_id: String,
        salt_key: String,
        salt_index: String,
        host: String,
    },
    Mock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Externally visible origin, used to build callback and redirect URLs.
    pub base_url: String,
    pub admin_secret: String,
    pub currency: String,
    pub gateway: GatewayConfig,
    pub gateway_timeout: Duration,
    pub smtp: Option<SmtpConfig>,
    pub notify_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let admin_secret = get("ADMIN_SECRET").ok_or(ConfigError::Missing("ADMIN_SECRET"))?;

        let bind_addr: SocketAddr = match (get("HOST"), get("PORT")) {
            (None, None) => parse("BIND_ADDR", DEFAULT_BIND_ADDR.to_string())?,
            (host, port) => parse(
                "HOST/PORT",
                format!(
                    "{}:{}",
                    host.unwrap_or_else(|| "0.0.0.0".to_string()),
                    port.unwrap_or_else(|| "3001".to_string())
                ),
            )?,
        };

        let base_url = get("BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = get("SMTP_USERNAME");
                Some(SmtpConfig {
                    host,
                    port: get("SMTP_PORT")
                        .map(|v| parse("SMTP_PORT", v))
                        .transpose()?
                        .unwrap_or(DEFAULT_SMTP_PORT),
                    from: get("SMTP_FROM")
                        .or_else(|| username.clone())
                        .unwrap_or_else(|| "noreply@eventpass.local".to_string()),
                    password: get("SMTP_PASSWORD"),
                    username,
                })
            }
            None => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .map(|v| parse("DB_MAX_CONNECTIONS", v))
                .transpose()?
                .unwrap_or(5),
            bind_addr,
            base_url,
            admin_secret,
            currency: get("CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            gateway: gateway_from(&get)?,
            gateway_timeout: seconds(&get, "GATEWAY_TIMEOUT_SECS")?,
            smtp,
            notify_timeout: seconds(&get, "NOTIFY_TIMEOUT_SECS")?,
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn seconds<F>(get: &F, key: &'static str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = get(key)
        .map(|v| parse::<u64>(key, v))
        .transpose()?
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Ok(Duration::from_secs(secs))
}

fn gateway_from<F>(get: &F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let razorpay = match (get("RAZORPAY_KEY_ID"), get("RAZORPAY_KEY_SECRET")) {
        (Some(key_id), Some(key_secret)) => Some(GatewayConfig::Razorpay { key_id, key_secret }),
        _ => None,
    };
    let phonepe = match (get("PHONEPE_MERCHANT_ID"), get("PHONEPE_SALT_KEY")) {
        (Some(merchant_id), Some(salt_key)) => Some(GatewayConfig::PhonePe {
            merchant_id,
            salt_key,
            salt_index: get("PHONEPE_SALT_INDEX").unwrap_or_else(|| "1".to_string()),
            host: get("PHONEPE_HOST").unwrap_or_else(|| DEFAULT_PHONEPE_HOST.to_string()),
        }),
        _ => None,
    };

    let selected = match get("PAYMENT_GATEWAY").map(|v| v.to_lowercase()).as_deref() {
        None => razorpay.or(phonepe),
        Some("razorpay") => razorpay.or_else(|| missing_credentials("razorpay")),
        Some("phonepe") => phonepe.or_else(|| missing_credentials("phonepe")),
        Some("mock") => None,
        Some(other) => {
            return Err(ConfigError::Invalid {
                key: "PAYMENT_GATEWAY",
                value: other.to_string(),
            })
        }
    };

    Ok(selected.unwrap_or(GatewayConfig::Mock))
}

fn missing_credentials(provider: &str) -> Option<GatewayConfig> {
    tracing::warn!(
        provider,
        "Payment gateway credentials missing, falling back to the sandbox gateway"
    );
    None
}

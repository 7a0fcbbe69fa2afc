use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod origin;
pub mod security;

pub use origin::require_same_origin;
pub use security::SecurityHeadersLayer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/workshops";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_SITE_ORIGINS: &str = "http://localhost:3001";
// Two weeks, matching the usual browser-session lifetime.
const DEFAULT_SESSION_TTL_SECS: u64 = 1_209_600;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the outbound payment request. Every static string the gateway
/// expects lives here rather than in globals.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    /// Merchant id, sent as `LMID`.
    pub merchant_id: String,
    pub title: String,
    pub description: String,
    pub contact_info: String,
    /// Accounting code A (speedtype) attached to every line item.
    pub speedtype: String,
    /// Accounting code B (account number) attached to every line item.
    pub account_number: String,
    /// PEM bundle that replaces the built-in trust roots when set.
    pub cert_bundle: Option<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Origins allowed to send state-changing requests.
    pub site_origins: Vec<String>,
    /// Bearer token that marks a request as staff (may preview drafts).
    pub staff_token: Option<String>,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub include_hsts: bool,
    pub gateway: GatewayConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let is_production = get("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let bind_addr = parse(
            "BIND_ADDR",
            get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        )?;
        let session_ttl = secs(
            "SESSION_TTL_SECS",
            get("SESSION_TTL_SECS"),
            DEFAULT_SESSION_TTL_SECS,
        )?;
        let timeout = secs(
            "PAYMENT_TIMEOUT_SECS",
            get("PAYMENT_TIMEOUT_SECS"),
            DEFAULT_GATEWAY_TIMEOUT_SECS,
        )?;

        let site_origins = parse_origins(
            &get("SITE_ORIGINS").unwrap_or_else(|| DEFAULT_SITE_ORIGINS.to_string()),
        );
        if site_origins.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SITE_ORIGINS",
                value: get("SITE_ORIGINS").unwrap_or_default(),
            });
        }

        let gateway = GatewayConfig {
            url: required("PAYMENT_URL")?,
            merchant_id: required("PAYMENT_LMID")?,
            title: get("PAYMENT_TITLE").unwrap_or_default(),
            description: get("PAYMENT_DESCRIPTION").unwrap_or_default(),
            contact_info: get("PAYMENT_CONTACT_INFO").unwrap_or_default(),
            speedtype: get("PSF_SPEEDTYPE").unwrap_or_default(),
            account_number: get("PSF_ACCT_NUMBER").unwrap_or_default(),
            cert_bundle: get("PAYMENT_CERT_BUNDLE").map(PathBuf::from),
            timeout,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            site_origins,
            staff_token: get("STAFF_TOKEN"),
            session_ttl,
            secure_cookies: is_production,
            include_hsts: is_production,
            gateway,
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn secs(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => parse(key, value).map(Duration::from_secs),
        None => Ok(Duration::from_secs(default)),
    }
}

/// Splits a comma separated origin list, dropping blanks and trailing slashes.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const GATEWAY: &[(&str, &str)] = &[
        ("PAYMENT_URL", "https://pay.example.edu/checkout"),
        ("PAYMENT_LMID", "1234"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(GATEWAY)).unwrap();
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.site_origins, ["http://localhost:3001"]);
        assert_eq!(config.session_ttl, Duration::from_secs(1_209_600));
        assert_eq!(config.gateway.timeout, Duration::from_secs(30));
        assert!(!config.include_hsts);
        assert!(config.staff_token.is_none());
        assert!(config.gateway.cert_bundle.is_none());
    }

    #[test]
    fn test_missing_gateway_url() {
        let err = AppConfig::from_lookup(lookup(&[("PAYMENT_LMID", "1234")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PAYMENT_URL")));
    }

    #[test]
    fn test_production_enables_hsts_and_secure_cookies() {
        let mut pairs = GATEWAY.to_vec();
        pairs.push(("RUST_ENV", "Production"));
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.include_hsts);
        assert!(config.secure_cookies);
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = GATEWAY.to_vec();
        pairs.push(("SESSION_TTL_SECS", "soon"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://Workshops.example.org/ , ,http://localhost:3001"),
            ["https://workshops.example.org", "http://localhost:3001"]
        );
    }
}

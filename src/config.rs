use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_TOKEN_TTL_SECS: u64 = 15 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub token_issuer: String,
    pub secure_cookies: bool,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_body_bytes: usize,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Required keys that are
    /// missing or blank are reported by name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("environment variable {key} is not set"))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = required("DATABASE_URL")?;
        let port: u16 = parse_value("SERVER_PORT", &required("SERVER_PORT")?)?;
        let jwt_secret = required("JWT_SECRET")?;

        let token_ttl_secs = parse_or("STOREFRONT_TOKEN_TTL_SECS", optional, DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl_secs == 0 {
            anyhow::bail!("STOREFRONT_TOKEN_TTL_SECS must be greater than zero");
        }

        Ok(Self {
            listen: format!("0.0.0.0:{port}"),
            database_url,
            db_max_connections: parse_or(
                "STOREFRONT_DB_MAX_CONNECTIONS",
                optional,
                DEFAULT_DB_MAX_CONNECTIONS,
            )?,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
            token_issuer: optional("STOREFRONT_TOKEN_ISSUER").unwrap_or_else(|| "ecom".into()),
            secure_cookies: optional("STOREFRONT_SECURE_COOKIES").is_none_or(|v| v != "false"),
            request_timeout: Duration::from_secs(parse_or(
                "STOREFRONT_REQUEST_TIMEOUT_SECS",
                optional,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            shutdown_grace: Duration::from_secs(parse_or(
                "STOREFRONT_SHUTDOWN_GRACE_SECS",
                optional,
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )?),
            max_body_bytes: parse_or("STOREFRONT_MAX_BODY_BYTES", optional, DEFAULT_MAX_BODY_BYTES)?,
            admin_email: optional("STOREFRONT_ADMIN_EMAIL"),
            admin_password: optional("STOREFRONT_ADMIN_PASSWORD"),
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("environment variable {key} has an invalid value: {raw:?}"))
}

fn parse_or<T>(key: &str, optional: impl Fn(&str) -> Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

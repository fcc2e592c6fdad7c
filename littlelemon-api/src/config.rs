//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `SECRET_KEY` - HMAC key used to sign access tokens
//!
//! ## Optional
//! - `BIND_ADDR` - Listen address (default: 0.0.0.0:8000)
//! - `ACCESS_TOKEN_TTL_HOURS` - Access token lifetime (default: 8)
//! - `DATABASE_POOL_SIZE` - Maximum pooled connections (default: 10)

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::TimeDelta;
use dotenvy::dotenv;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 8;
const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub bind_addr: SocketAddr,
    pub access_token_ttl: TimeDelta,
    pub pool_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let database_url = required("DATABASE_URL")?;
        let secret_key = required("SECRET_KEY")?;
        if secret_key.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SECRET_KEY".into(),
                "must not be empty".into(),
            ));
        }

        let bind_addr = parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let ttl_hours: i64 = parse_or(&lookup, "ACCESS_TOKEN_TTL_HOURS", Some(DEFAULT_TOKEN_TTL_HOURS))?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ACCESS_TOKEN_TTL_HOURS".into(),
                "must be positive".into(),
            ));
        }
        let pool_size: u32 = parse_or(&lookup, "DATABASE_POOL_SIZE", Some(DEFAULT_POOL_SIZE))?;
        if pool_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DATABASE_POOL_SIZE".into(),
                "must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            secret_key,
            bind_addr,
            access_token_ttl: TimeDelta::hours(ttl_hours),
            pool_size,
        })
    }
}

/// Maintenance commands only need the database, not a signing key.
pub fn database_url_from_env() -> Result<String, ConfigError> {
    dotenv().ok();
    env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.into(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.into())),
    }
}

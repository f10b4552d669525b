use std::env;
use std::path::PathBuf;

use uuid::Uuid;

use crate::engine::lifecycle::EngineConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub rating_requires_terminal: bool,
    pub default_owner_id: Option<Uuid>,
    pub directory_seed: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal("missing JWT_SECRET".to_string()))?;

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 5000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            jwt_secret,
            token_ttl_hours: parse_or_default("TOKEN_TTL_HOURS", 24 * 7)?,
            rating_requires_terminal: parse_or_default("RATING_REQUIRES_TERMINAL", false)?,
            default_owner_id: parse_optional("DEFAULT_OWNER_ID")?,
            directory_seed: env::var("DIRECTORY_SEED").ok().map(PathBuf::from),
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            rating_requires_terminal: self.rating_requires_terminal,
            default_owner_id: self.default_owner_id,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}

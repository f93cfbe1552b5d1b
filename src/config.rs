use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Distance used when a quote is requested without usable coordinates.
    pub default_distance_km: f64,
    /// Offset applied when rendering timeline times (EAT by default).
    pub timeline_utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            default_distance_km: 5.0,
            timeline_utc_offset_minutes: 180,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            default_distance_km: parse_or_default(
                "DEFAULT_DISTANCE_KM",
                defaults.default_distance_km,
            )?,
            timeline_utc_offset_minutes: parse_or_default(
                "TIMELINE_UTC_OFFSET_MINUTES",
                defaults.timeline_utc_offset_minutes,
            )?,
        };

        if config.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "invalid EVENT_BUFFER_SIZE: must be > 0".to_string(),
            ));
        }
        if !config.default_distance_km.is_finite() || config.default_distance_km < 0.0 {
            return Err(AppError::Internal(
                "invalid DEFAULT_DISTANCE_KM: must be a non-negative number".to_string(),
            ));
        }
        if config.timeline_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::Internal(
                "invalid TIMELINE_UTC_OFFSET_MINUTES: must be within one day".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

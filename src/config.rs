use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::external::geocode::NominatimConfig;
use crate::state::EngineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub geocoder_url: String,
    pub geocoder_timeout_secs: u64,
    pub tracking_tick_ms: u64,
    pub sim_seconds_per_tick: f64,
    pub event_buffer_size: usize,
    pub tracking_retention_secs: u64,
    pub sim_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| NominatimConfig::default().base_url),
            geocoder_timeout_secs: parse_or_default("GEOCODER_TIMEOUT_SECS", 5)?,
            tracking_tick_ms: parse_or_default("TRACKING_TICK_MS", 3000)?,
            sim_seconds_per_tick: parse_or_default("SIM_SECONDS_PER_TICK", 3.0)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 64)?,
            tracking_retention_secs: parse_or_default("TRACKING_RETENTION_SECS", 300)?,
            sim_seed: parse_optional("SIM_SEED")?,
        };

        if config.tracking_tick_ms == 0 {
            return Err(AppError::Internal("TRACKING_TICK_MS must be > 0".to_string()));
        }
        if !config.sim_seconds_per_tick.is_finite() || config.sim_seconds_per_tick <= 0.0 {
            return Err(AppError::Internal(
                "SIM_SECONDS_PER_TICK must be a positive number".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tick_interval: Duration::from_millis(self.tracking_tick_ms),
            sim_seconds_per_tick: self.sim_seconds_per_tick,
            event_buffer_size: self.event_buffer_size,
            retention: Duration::from_secs(self.tracking_retention_secs),
            seed: self.sim_seed,
        }
    }

    pub fn geocoder(&self) -> NominatimConfig {
        NominatimConfig {
            base_url: self.geocoder_url.clone(),
            timeout_secs: self.geocoder_timeout_secs,
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
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}

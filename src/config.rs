use serde::Serialize;
use utoipa::ToSchema;

use crate::services::cycle::SummaryScope;
use crate::services::units::TemperatureUnit;

const DEFAULT_OWM_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const DEFAULT_DATABASE_URL: &str = "sqlite://weather_data.db";
const DEFAULT_CITIES: &str = "Delhi=1273294,Mumbai=1275339,Chennai=1264527,\
Bangalore=1277333,Kolkata=1275004,Hyderabad=1269843";

/// A monitored city and its provider-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct City {
    /// Display name, used as the `city` label on readings and summaries
    pub name: String,
    /// OpenWeatherMap city id
    pub provider_id: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub owm_api_key: String,
    pub owm_base_url: String,
    pub owm_units: TemperatureUnit,
    /// Monitored cities, in configuration order.
    pub cities: Vec<City>,
    pub alert_threshold_c: f64,
    /// Consecutive breaching cycles required before a city alerts (1 = every breach).
    pub alert_consecutive_breaches: u32,
    pub poll_interval_minutes: u64,
    pub fetch_max_retries: u32,
    pub summary_scope: SummaryScope,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let owm_api_key = lookup("OWM_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("OWM_API_KEY"))?;

        let cities_raw = lookup("CITIES").unwrap_or_else(|| DEFAULT_CITIES.to_string());
        let cities = parse_cities(&cities_raw).map_err(|reason| ConfigError::Invalid {
            name: "CITIES",
            reason,
        })?;

        let alert_threshold_c: f64 = parse_or("ALERT_THRESHOLD_C", &lookup, 35.0)?;
        if !alert_threshold_c.is_finite() {
            return Err(ConfigError::Invalid {
                name: "ALERT_THRESHOLD_C",
                reason: "must be a finite number".to_string(),
            });
        }

        let alert_consecutive_breaches: u32 = parse_or("ALERT_CONSECUTIVE_BREACHES", &lookup, 1)?;
        if alert_consecutive_breaches == 0 {
            return Err(ConfigError::Invalid {
                name: "ALERT_CONSECUTIVE_BREACHES",
                reason: "must be at least 1".to_string(),
            });
        }

        let poll_interval_minutes: u64 = parse_or("POLL_INTERVAL_MINUTES", &lookup, 5)?;
        if poll_interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_MINUTES",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            owm_api_key,
            owm_base_url: lookup("OWM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OWM_BASE_URL.to_string()),
            owm_units: parse_or("OWM_UNITS", &lookup, TemperatureUnit::Kelvin)?,
            cities,
            alert_threshold_c,
            alert_consecutive_breaches,
            poll_interval_minutes,
            fetch_max_retries: parse_or("FETCH_MAX_RETRIES", &lookup, 1)?,
            summary_scope: parse_or("SUMMARY_SCOPE", &lookup, SummaryScope::PerCity)?,
            port: parse_or("PORT", &lookup, 8080)?,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a `Name=id,Name=id` city list. Order is preserved; names must be unique.
pub fn parse_cities(raw: &str) -> Result<Vec<City>, String> {
    let mut cities: Vec<City> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, id) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected Name=id, got '{}'", entry))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("empty city name in '{}'", entry));
        }
        let provider_id = id
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid id for {}: {}", name, e))?;
        if cities.iter().any(|c| c.name == name) {
            return Err(format!("duplicate city '{}'", name));
        }
        cities.push(City {
            name: name.to_string(),
            provider_id,
        });
    }
    if cities.is_empty() {
        return Err("at least one city must be configured".to_string());
    }
    Ok(cities)
}

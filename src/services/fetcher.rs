//! Reading fetcher.
//!
//! Resolves a configured city to its provider id, calls the weather provider
//! once and normalises the raw observation into a Celsius [`Reading`].
//! Retries are the orchestrator's business, not the fetcher's.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::City;
use crate::errors::AppError;
use crate::services::units::TemperatureUnit;

/// Observation as reported by the provider, before unit normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub temperature: f64,
    pub feels_like: f64,
    pub unit: TemperatureUnit,
    pub condition: String,
    /// Provider observation time, seconds since the Unix epoch.
    pub observed_at: i64,
}

/// One city's normalised observation at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub city: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    /// Display only; never used for grouping.
    pub observed_at: DateTime<Utc>,
}

/// Remote weather capability.
///
/// Fails with [`AppError::Network`] when the provider cannot be reached and
/// [`AppError::Parse`] when its payload is unusable.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, city_id: u32) -> Result<RawReading, AppError>;
}

/// Fetches and normalises readings for the configured city table.
#[derive(Clone)]
pub struct ReadingFetcher {
    provider: Arc<dyn WeatherProvider>,
    cities: Vec<City>,
}

impl ReadingFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>, cities: Vec<City>) -> Self {
        Self { provider, cities }
    }

    /// Configured cities, in configuration order.
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    fn resolve(&self, city: &str) -> Result<&City, AppError> {
        self.cities
            .iter()
            .find(|c| c.name == city)
            .ok_or_else(|| AppError::UnknownCity(city.to_string()))
    }

    /// Fetch the current reading for `city`.
    pub async fn fetch(&self, city: &str) -> Result<Reading, AppError> {
        let city = self.resolve(city)?;
        let raw = self.provider.fetch(city.provider_id).await?;
        let reading = normalize(&city.name, raw)?;

        tracing::info!(
            "Weather for {}: {:.2}°C, feels like {:.2}°C, condition: {} (observed {})",
            reading.city,
            reading.temperature_c,
            reading.feels_like_c,
            reading.condition,
            reading.observed_at,
        );

        Ok(reading)
    }
}

/// Convert a raw provider observation into a canonical [`Reading`].
pub fn normalize(city: &str, raw: RawReading) -> Result<Reading, AppError> {
    let temperature_c = raw.unit.to_celsius(raw.temperature);
    let feels_like_c = raw.unit.to_celsius(raw.feels_like);
    if !temperature_c.is_finite() || !feels_like_c.is_finite() {
        return Err(AppError::Parse(format!(
            "non-finite temperature for {} (temp={}, feels_like={})",
            city, raw.temperature, raw.feels_like
        )));
    }

    let condition = raw.condition.trim();
    if condition.is_empty() {
        return Err(AppError::Parse(format!("empty weather condition for {}", city)));
    }

    let observed_at = DateTime::<Utc>::from_timestamp(raw.observed_at, 0).ok_or_else(|| {
        AppError::Parse(format!(
            "observation timestamp {} out of range for {}",
            raw.observed_at, city
        ))
    })?;

    Ok(Reading {
        city: city.to_string(),
        temperature_c,
        feels_like_c,
        condition: condition.to_string(),
        observed_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider double: canned result per city id, counting calls.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        responses: Mutex<HashMap<u32, Vec<Result<RawReading, AppError>>>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        /// Always answer `city_id` with a Celsius reading.
        pub(crate) fn with_reading(self, city_id: u32, temp_c: f64, condition: &str) -> Self {
            self.push(city_id, Ok(raw_celsius(temp_c, condition)))
        }

        /// Queue a result; the last queued result for an id is repeated forever.
        pub(crate) fn push(self, city_id: u32, result: Result<RawReading, AppError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(city_id)
                .or_default()
                .push(result);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn clone_result(r: &Result<RawReading, AppError>) -> Result<RawReading, AppError> {
        match r {
            Ok(raw) => Ok(raw.clone()),
            Err(AppError::Network(m)) => Err(AppError::Network(m.clone())),
            Err(AppError::Parse(m)) => Err(AppError::Parse(m.clone())),
            Err(other) => Err(AppError::InternalError(other.to_string())),
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch(&self, city_id: u32) -> Result<RawReading, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let queue = responses
                .get_mut(&city_id)
                .ok_or_else(|| AppError::Network(format!("no route to city {}", city_id)))?;
            if queue.len() > 1 {
                clone_result(&queue.remove(0))
            } else {
                clone_result(&queue[0])
            }
        }
    }

    pub(crate) fn raw_celsius(temp_c: f64, condition: &str) -> RawReading {
        RawReading {
            temperature: temp_c,
            feels_like: temp_c,
            unit: TemperatureUnit::Celsius,
            condition: condition.to_string(),
            observed_at: 1_760_868_000,
        }
    }

    pub(crate) fn city(name: &str, provider_id: u32) -> City {
        City {
            name: name.to_string(),
            provider_id,
        }
    }

    #[test]
    fn test_normalize_converts_kelvin() {
        let raw = RawReading {
            temperature: 303.15,
            feels_like: 305.15,
            unit: TemperatureUnit::Kelvin,
            condition: "Clear".to_string(),
            observed_at: 1_760_868_000,
        };
        let reading = normalize("Delhi", raw).unwrap();
        assert_eq!(reading.city, "Delhi");
        assert!((reading.temperature_c - 30.0).abs() < 1e-9);
        assert!((reading.feels_like_c - 32.0).abs() < 1e-9);
        assert_eq!(reading.condition, "Clear");
        assert_eq!(reading.observed_at.timestamp(), 1_760_868_000);
    }

    #[test]
    fn test_normalize_rejects_nan() {
        let mut raw = raw_celsius(20.0, "Rain");
        raw.temperature = f64::NAN;
        assert!(matches!(normalize("Delhi", raw), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_normalize_rejects_blank_condition() {
        let raw = raw_celsius(20.0, "   ");
        assert!(matches!(normalize("Delhi", raw), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_normalize_rejects_out_of_range_timestamp() {
        let mut raw = raw_celsius(20.0, "Rain");
        raw.observed_at = i64::MAX;
        assert!(matches!(normalize("Delhi", raw), Err(AppError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_resolves_configured_city() {
        let provider = Arc::new(FakeProvider::default().with_reading(1273294, 31.5, "Haze"));
        let fetcher = ReadingFetcher::new(provider.clone(), vec![city("Delhi", 1273294)]);

        let reading = fetcher.fetch("Delhi").await.unwrap();
        assert_eq!(reading.city, "Delhi");
        assert_eq!(reading.temperature_c, 31.5);
        assert_eq!(reading.condition, "Haze");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_city_skips_provider() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = ReadingFetcher::new(provider.clone(), vec![city("Delhi", 1273294)]);

        let err = fetcher.fetch("Atlantis").await.unwrap_err();
        assert!(matches!(err, AppError::UnknownCity(ref c) if c == "Atlantis"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_propagates_provider_error_without_retry() {
        let provider = Arc::new(
            FakeProvider::default().push(1, Err(AppError::Network("timeout".to_string()))),
        );
        let fetcher = ReadingFetcher::new(provider.clone(), vec![city("A", 1)]);

        let err = fetcher.fetch("A").await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
        assert_eq!(provider.calls(), 1);
    }
}

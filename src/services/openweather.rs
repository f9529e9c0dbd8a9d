//! OpenWeatherMap current-weather client.
//!
//! See: https://openweathermap.org/current#cityid

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::fetcher::{RawReading, WeatherProvider};
use crate::services::units::TemperatureUnit;

/// Upper bound on a single provider request, so a hung call cannot stall a cycle.
const OWM_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the OpenWeatherMap current weather API.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    units: TemperatureUnit,
}

// --- OpenWeatherMap JSON response types ---

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    weather: Vec<OwmWeather>,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    main: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: &str, base_url: &str, units: TemperatureUnit) -> Result<Self, AppError> {
        Self::with_timeout(
            api_key,
            base_url,
            units,
            Duration::from_secs(OWM_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        api_key: &str,
        base_url: &str,
        units: TemperatureUnit,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            units,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, city_id: u32) -> Result<RawReading, AppError> {
        let city_id = city_id.to_string();
        // `without_url` keeps the appid query parameter out of error messages and logs.
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("id", city_id.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_query_param()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::Network(format!("OpenWeatherMap request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "OpenWeatherMap returned HTTP {} for city {}",
                response.status(),
                city_id
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::Network(format!(
                "OpenWeatherMap response body failed: {}",
                e.without_url()
            ))
        })?;

        parse_current_weather(&body, self.units)
    }
}

/// Parse a current-weather JSON body. Pure function, no I/O.
pub fn parse_current_weather(body: &str, unit: TemperatureUnit) -> Result<RawReading, AppError> {
    let response: OwmResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Parse(format!("OpenWeatherMap JSON parse error: {}", e)))?;

    let condition = response
        .weather
        .into_iter()
        .next()
        .map(|w| w.main)
        .ok_or_else(|| AppError::Parse("OpenWeatherMap returned no weather entries".to_string()))?;

    Ok(RawReading {
        temperature: response.main.temp,
        feels_like: response.main.feels_like,
        unit,
        condition,
        observed_at: response.dt,
    })
}

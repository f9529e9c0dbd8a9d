//! Temperature unit conversion.
//!
//! Everything downstream of the fetcher works in Celsius. The provider reports
//! Kelvin by default (`units=standard`), Celsius for `units=metric` and
//! Fahrenheit for `units=imperial`.

use std::fmt;
use std::str::FromStr;

/// Offset between the Kelvin and Celsius scales.
const KELVIN_OFFSET: f64 = 273.15;

/// Convert Kelvin to Celsius.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Convert Celsius to Kelvin.
#[cfg(test)]
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Convert Fahrenheit to Celsius.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Temperature unit a provider value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Kelvin,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a value in this unit to Celsius.
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin_to_celsius(value),
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => fahrenheit_to_celsius(value),
        }
    }

    /// Value of the OpenWeatherMap `units` query parameter.
    pub fn as_query_param(self) -> &'static str {
        match self {
            TemperatureUnit::Kelvin => "standard",
            TemperatureUnit::Celsius => "metric",
            TemperatureUnit::Fahrenheit => "imperial",
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "kelvin" => Ok(TemperatureUnit::Kelvin),
            "metric" | "celsius" => Ok(TemperatureUnit::Celsius),
            "imperial" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!(
                "unsupported unit system '{}' (expected standard, metric or imperial)",
                other
            )),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_param())
    }
}

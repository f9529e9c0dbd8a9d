//! Temperature threshold checks.
//!
//! `check` looks at one reading in isolation. `BreachTracker` adds the
//! optional "N consecutive cycles above threshold" rule on top; with a
//! required streak of 1 it alerts on every breach, exactly like `check`.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::fetcher::Reading;

/// A reading that breached the configured threshold. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Alert {
    pub city: String,
    pub temperature_c: f64,
    pub threshold: f64,
    /// Consecutive breaching cycles for this city, including this one
    pub consecutive_breaches: u32,
}

/// Emit an alert iff the reading is strictly above `threshold`.
pub fn check(reading: &Reading, threshold: f64) -> Option<Alert> {
    if reading.temperature_c > threshold {
        Some(Alert {
            city: reading.city.clone(),
            temperature_c: reading.temperature_c,
            threshold,
            consecutive_breaches: 1,
        })
    } else {
        None
    }
}

/// Surface an alert to the operator.
pub fn emit(alert: &Alert) {
    tracing::warn!(
        "Alert: {} temperature exceeded {}°C: {:.2}°C ({} consecutive)",
        alert.city,
        alert.threshold,
        alert.temperature_c,
        alert.consecutive_breaches,
    );
}

/// Per-city breach streaks carried across cycles.
#[derive(Debug, Clone)]
pub struct BreachTracker {
    required: u32,
    streaks: HashMap<String, u32>,
}

impl BreachTracker {
    /// `required` is clamped to at least 1.
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            streaks: HashMap::new(),
        }
    }

    /// Record a reading and return an alert once the city's streak reaches the
    /// required length. A non-breaching reading resets the streak.
    pub fn observe(&mut self, reading: &Reading, threshold: f64) -> Option<Alert> {
        match check(reading, threshold) {
            Some(mut alert) => {
                let streak = self.streaks.entry(reading.city.clone()).or_insert(0);
                *streak = streak.saturating_add(1);
                alert.consecutive_breaches = *streak;
                (*streak >= self.required).then_some(alert)
            }
            None => {
                self.streaks.remove(&reading.city);
                None
            }
        }
    }

    #[cfg(test)]
    pub fn streak(&self, city: &str) -> u32 {
        self.streaks.get(city).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn reading(city: &str, temp: f64) -> Reading {
        Reading {
            city: city.to_string(),
            temperature_c: temp,
            feels_like_c: temp,
            condition: "Clear".to_string(),
            observed_at: DateTime::<Utc>::from_timestamp(1_760_868_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_strictly_above_threshold_alerts() {
        let alert = check(&reading("Delhi", 35.1), 35.0).unwrap();
        assert_eq!(alert.city, "Delhi");
        assert_eq!(alert.temperature_c, 35.1);
        assert_eq!(alert.threshold, 35.0);
    }

    #[test]
    fn test_equal_to_threshold_does_not_alert() {
        assert_eq!(check(&reading("Delhi", 35.0), 35.0), None);
        assert_eq!(check(&reading("Delhi", -10.0), 35.0), None);
    }

    #[test]
    fn test_check_is_stateless() {
        let r = reading("Delhi", 40.0);
        assert_eq!(check(&r, 35.0), check(&r, 35.0));
    }

    #[test]
    fn test_tracker_single_breach_alerts_every_time() {
        let mut tracker = BreachTracker::new(1);
        for i in 1..=3 {
            let alert = tracker.observe(&reading("Delhi", 36.0), 35.0).unwrap();
            assert_eq!(alert.consecutive_breaches, i);
        }
    }

    #[test]
    fn test_tracker_requires_consecutive_breaches() {
        let mut tracker = BreachTracker::new(2);
        assert!(tracker.observe(&reading("Delhi", 36.0), 35.0).is_none());
        let alert = tracker.observe(&reading("Delhi", 37.0), 35.0).unwrap();
        assert_eq!(alert.consecutive_breaches, 2);
        // Keeps firing while the condition holds
        assert!(tracker.observe(&reading("Delhi", 36.5), 35.0).is_some());
    }

    #[test]
    fn test_tracker_resets_on_cool_reading() {
        let mut tracker = BreachTracker::new(2);
        tracker.observe(&reading("Delhi", 36.0), 35.0);
        tracker.observe(&reading("Delhi", 30.0), 35.0);
        assert_eq!(tracker.streak("Delhi"), 0);
        assert!(tracker.observe(&reading("Delhi", 36.0), 35.0).is_none());
    }

    #[test]
    fn test_tracker_streaks_are_per_city() {
        let mut tracker = BreachTracker::new(2);
        tracker.observe(&reading("Delhi", 36.0), 35.0);
        assert!(tracker.observe(&reading("Mumbai", 36.0), 35.0).is_none());
        assert_eq!(tracker.streak("Delhi"), 1);
        assert_eq!(tracker.streak("Mumbai"), 1);
    }

    #[test]
    fn test_tracker_zero_required_is_clamped() {
        let mut tracker = BreachTracker::new(0);
        assert!(tracker.observe(&reading("Delhi", 36.0), 35.0).is_some());
    }
}

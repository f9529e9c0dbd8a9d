//! Daily rollup of a batch of readings.
//!
//! The summary's `city` is taken from the first reading, so callers that want
//! one rollup per city must split the batch with [`group_by_city`] first.

use chrono::NaiveDate;

use crate::db::models::Summary;
use crate::errors::AppError;
use crate::services::fetcher::Reading;

/// Fold a non-empty batch of readings into a [`Summary`].
///
/// Deterministic for a given input order: ties in the dominant condition go to
/// the label seen first.
pub fn aggregate(readings: &[Reading], date: NaiveDate) -> Result<Summary, AppError> {
    let first = readings.first().ok_or(AppError::EmptyBatch)?;

    // Running mean; dividing before subtracting keeps finite inputs finite.
    let mut mean = 0.0;
    let mut max_temp = f64::NEG_INFINITY;
    let mut min_temp = f64::INFINITY;
    for (i, reading) in readings.iter().enumerate() {
        let n = (i + 1) as f64;
        mean += reading.temperature_c / n - mean / n;
        max_temp = max_temp.max(reading.temperature_c);
        min_temp = min_temp.min(reading.temperature_c);
    }
    // Rounding must not break min <= avg <= max.
    let avg_temp = if mean < min_temp {
        min_temp
    } else if mean > max_temp {
        max_temp
    } else {
        mean
    };

    let dominant_condition = dominant_condition(readings.iter().map(|r| r.condition.as_str()))
        .unwrap_or_default()
        .to_string();

    Ok(Summary {
        city: first.city.clone(),
        date,
        avg_temp,
        max_temp,
        min_temp,
        dominant_condition,
        reading_count: readings.len() as i64,
    })
}

/// Most frequent label; the earliest-seen label wins a tie.
pub fn dominant_condition<'a>(conditions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    // Insertion-ordered counts; batches are a handful of cities.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for condition in conditions {
        match counts.iter_mut().find(|(label, _)| *label == condition) {
            Some((_, count)) => *count += 1,
            None => counts.push((condition, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

/// Partition readings by city, keeping first-seen city order and per-city
/// reading order.
pub fn group_by_city(readings: Vec<Reading>) -> Vec<(String, Vec<Reading>)> {
    let mut groups: Vec<(String, Vec<Reading>)> = Vec::new();
    for reading in readings {
        match groups.iter_mut().find(|(city, _)| *city == reading.city) {
            Some((_, group)) => group.push(reading),
            None => groups.push((reading.city.clone(), vec![reading])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn reading(city: &str, temp: f64, condition: &str) -> Reading {
        Reading {
            city: city.to_string(),
            temperature_c: temp,
            feels_like_c: temp,
            condition: condition.to_string(),
            observed_at: DateTime::<Utc>::from_timestamp(1_760_868_000, 0).unwrap(),
        }
    }

    fn date() -> NaiveDate {
        "2026-10-19".parse().unwrap()
    }

    #[test]
    fn test_aggregate_basic_batch() {
        let readings = vec![
            reading("Delhi", 30.0, "Rain"),
            reading("Delhi", 34.0, "Rain"),
            reading("Delhi", 32.0, "Clear"),
        ];
        let summary = aggregate(&readings, date()).unwrap();
        assert_eq!(summary.city, "Delhi");
        assert_eq!(summary.date, date());
        assert_eq!(summary.avg_temp, 32.0);
        assert_eq!(summary.max_temp, 34.0);
        assert_eq!(summary.min_temp, 30.0);
        assert_eq!(summary.dominant_condition, "Rain");
        assert_eq!(summary.reading_count, 3);
    }

    #[test]
    fn test_aggregate_empty_batch() {
        assert!(matches!(aggregate(&[], date()), Err(AppError::EmptyBatch)));
    }

    #[test]
    fn test_aggregate_single_reading() {
        let summary = aggregate(&[reading("Pune", -3.25, "Snow")], date()).unwrap();
        assert_eq!(summary.avg_temp, -3.25);
        assert_eq!(summary.max_temp, -3.25);
        assert_eq!(summary.min_temp, -3.25);
        assert_eq!(summary.dominant_condition, "Snow");
    }

    #[test]
    fn test_aggregate_labels_mixed_batch_with_first_city() {
        let readings = vec![reading("A", 20.0, "Clear"), reading("B", 36.0, "Rain")];
        let summary = aggregate(&readings, date()).unwrap();
        assert_eq!(summary.city, "A");
        assert_eq!(summary.avg_temp, 28.0);
    }

    #[test]
    fn test_min_avg_max_invariant_holds() {
        // Values chosen so the naive mean drifts in the last bit.
        let batches: Vec<Vec<f64>> = vec![
            vec![0.1; 10],
            vec![1e16, 1.0, -1e16],
            vec![33.3, 33.3, 33.3],
            vec![-40.0, 50.0, 0.7, 12.9, 12.9],
        ];
        for temps in batches {
            let readings: Vec<Reading> = temps.iter().map(|t| reading("X", *t, "Clear")).collect();
            let s = aggregate(&readings, date()).unwrap();
            assert!(
                s.min_temp <= s.avg_temp && s.avg_temp <= s.max_temp,
                "invariant broken for {:?}: {} <= {} <= {}",
                temps,
                s.min_temp,
                s.avg_temp,
                s.max_temp
            );
        }
    }

    #[test]
    fn test_aggregate_extreme_values_do_not_overflow() {
        let readings = vec![
            reading("X", f64::MAX, "Clear"),
            reading("X", f64::MAX, "Clear"),
            reading("X", -f64::MAX, "Clear"),
        ];
        let s = aggregate(&readings, date()).unwrap();
        let expected = f64::MAX / 3.0;
        assert!(s.avg_temp.is_finite());
        assert!(
            ((s.avg_temp - expected) / expected).abs() < 1e-12,
            "expected ~{}, got {}",
            expected,
            s.avg_temp
        );
        assert_eq!(s.max_temp, f64::MAX);
        assert_eq!(s.min_temp, -f64::MAX);
    }

    #[test]
    fn test_dominant_condition_tie_goes_to_first_seen() {
        assert_eq!(dominant_condition(["Clear", "Rain"]), Some("Clear"));
        assert_eq!(dominant_condition(["Rain", "Clear", "Clear", "Rain"]), Some("Rain"));
        assert_eq!(
            dominant_condition(["Haze", "Rain", "Clear", "Rain"]),
            Some("Rain")
        );
        assert_eq!(dominant_condition(std::iter::empty()), None);
    }

    #[test]
    fn test_aggregate_is_order_dependent_only_on_ties() {
        let forward = vec![reading("A", 1.0, "Clear"), reading("A", 2.0, "Rain")];
        let backward = vec![reading("A", 2.0, "Rain"), reading("A", 1.0, "Clear")];
        let f = aggregate(&forward, date()).unwrap();
        let b = aggregate(&backward, date()).unwrap();
        assert_eq!(f.avg_temp, b.avg_temp);
        assert_eq!(f.dominant_condition, "Clear");
        assert_eq!(b.dominant_condition, "Rain");
    }

    #[test]
    fn test_group_by_city_preserves_order() {
        let groups = group_by_city(vec![
            reading("B", 1.0, "Clear"),
            reading("A", 2.0, "Rain"),
            reading("B", 3.0, "Rain"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "B");
        assert_eq!(
            groups[0].1.iter().map(|r| r.temperature_c).collect::<Vec<_>>(),
            vec![1.0, 3.0]
        );
        assert_eq!(groups[1].0, "A");
        assert!(group_by_city(Vec::new()).is_empty());
    }
}

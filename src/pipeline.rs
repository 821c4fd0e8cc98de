// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::aggregate::aggregate_by_interval;
use crate::filter::filter_by_range;
use crate::models::{AggregatedBucket, Interval, RateSample, TimeRange};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

/// What the user currently has selected in the chart controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSelection {
    pub range: TimeRange,
    pub interval: Interval,
}

impl ViewSelection {
    pub fn new(range: TimeRange, interval: Interval) -> Self {
        Self { range, interval }
    }

    pub fn with_range(self, range: TimeRange) -> Self {
        Self { range, ..self }
    }

    pub fn with_interval(self, interval: Interval) -> Self {
        Self { interval, ..self }
    }
}

/// Chart-ready data: chronologically sorted buckets plus parallel labels and values
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub title: String,
    pub selection: ViewSelection,
    pub buckets: Vec<AggregatedBucket>,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// `(index, rate)` pairs for plotting on a category axis
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect()
    }

    /// Min and max rate, padded so a flat line is not drawn on the frame
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let pad = if max > min {
            (max - min) * 0.05
        } else {
            (min.abs() * 0.001).max(1e-6)
        };
        Some((min - pad, max + pad))
    }

    /// Label for a (possibly fractional) x position, empty between categories
    pub fn label_at(&self, x: f64) -> String {
        if x < 0.0 || (x - x.round()).abs() > 1e-6 {
            return String::new();
        }
        self.labels.get(x.round() as usize).cloned().unwrap_or_default()
    }
}

pub fn chart_title(interval: Interval) -> String {
    format!("Conversion Rate Over Time ({})", interval)
}

/// Order buckets by the instant they start at. Bucket keys are not used for ordering.
pub fn sort_chronologically(buckets: &mut [AggregatedBucket]) {
    buckets.sort_by_key(|bucket| bucket.start);
}

/// Filter, aggregate and sort `samples` for display.
///
/// Always pass the full fetched history: nothing here remembers a previous selection, so
/// switching range or interval never compounds an earlier filter.
pub fn prepare_series<Tz>(
    samples: &[RateSample],
    selection: ViewSelection,
    now: DateTime<Utc>,
    tz: &Tz,
) -> ChartSeries
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let filtered = filter_by_range(samples, selection.range, now);
    let mut buckets = aggregate_by_interval(&filtered, selection.interval, tz);
    sort_chronologically(&mut buckets);

    tracing::debug!(
        "Prepared {} buckets from {} of {} samples (range {}, interval {})",
        buckets.len(),
        filtered.len(),
        samples.len(),
        selection.range,
        selection.interval
    );

    let labels = buckets
        .iter()
        .map(|b| {
            b.start
                .with_timezone(tz)
                .format(selection.interval.label_format())
                .to_string()
        })
        .collect();
    let values = buckets.iter().map(|b| b.conversion_rate).collect();

    ChartSeries {
        title: chart_title(selection.interval),
        selection,
        buckets,
        labels,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 8, 12, 0, 0).unwrap()
    }

    /// Newest first, like the tracker backend returns them
    fn history() -> Vec<RateSample> {
        let mut samples: Vec<RateSample> = (0..(3 * 24 * 60))
            .map(|minutes_ago| {
                RateSample::new(
                    now() - Duration::minutes(minutes_ago),
                    1.0 + (minutes_ago % 7) as f64 / 100.0,
                )
            })
            .collect();
        // a few stragglers from last month
        samples.push(RateSample::new(now() - Duration::days(31), 0.95));
        samples.push(RateSample::new(now() - Duration::days(40), 0.94));
        samples
    }

    #[test]
    fn test_buckets_are_chronological() {
        let samples = history();
        for interval in Interval::ALL {
            for range in TimeRange::ALL {
                let series = prepare_series(&samples, ViewSelection::new(range, interval), now(), &Utc);
                assert!(
                    series.buckets.windows(2).all(|w| w[0].start <= w[1].start),
                    "unsorted for {} / {}",
                    range,
                    interval
                );
                assert_eq!(series.labels.len(), series.values.len());
                assert_eq!(series.labels.len(), series.buckets.len());
            }
        }
    }

    #[test]
    fn test_sort_across_month_boundary() {
        let mut buckets = vec![
            AggregatedBucket {
                key: "2024-10-01".to_string(),
                start: Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
                conversion_rate: 1.0,
                samples: 1,
            },
            AggregatedBucket {
                key: "2024-09-30".to_string(),
                start: Utc.with_ymd_and_hms(2024, 9, 30, 0, 0, 0).unwrap(),
                conversion_rate: 2.0,
                samples: 1,
            },
        ];
        sort_chronologically(&mut buckets);
        assert_eq!(buckets[0].key, "2024-09-30");
    }

    #[test]
    fn test_reselecting_range_starts_from_full_history() {
        let samples = history();
        let original = samples.clone();

        let hourly_week = ViewSelection::new(TimeRange::LastWeek, Interval::Hour);
        let narrowed = prepare_series(&samples, hourly_week.with_range(TimeRange::LastHour), now(), &Utc);
        let widened = prepare_series(&samples, narrowed.selection.with_range(TimeRange::AllTime), now(), &Utc);
        let direct = prepare_series(&samples, ViewSelection::new(TimeRange::AllTime, Interval::Hour), now(), &Utc);

        assert!(narrowed.len() <= 2);
        assert_eq!(widened, direct);
        assert_eq!(widened.buckets.iter().map(|b| b.samples).sum::<usize>(), samples.len());
        assert_eq!(samples, original);
    }

    #[test]
    fn test_series_title_and_labels() {
        let samples = vec![
            RateSample::new(Utc.with_ymd_and_hms(2024, 10, 1, 10, 0, 10).unwrap(), 1.0),
            RateSample::new(Utc.with_ymd_and_hms(2024, 10, 1, 10, 0, 45).unwrap(), 1.5),
            RateSample::new(Utc.with_ymd_and_hms(2024, 10, 1, 9, 59, 0).unwrap(), 3.0),
        ];
        let series = prepare_series(&samples, ViewSelection::default(), now(), &Utc);

        assert_eq!(series.title, "Conversion Rate Over Time (minute)");
        assert_eq!(series.labels, vec!["01 Oct 09:59", "01 Oct 10:00"]);
        assert_relative_eq!(series.values[1], 1.25);
        assert_eq!(series.label_at(1.0), "01 Oct 10:00");
        assert_eq!(series.label_at(0.5), "");
        assert_eq!(series.label_at(7.0), "");
    }

    #[test]
    fn test_value_bounds() {
        let mut series = prepare_series(&[], ViewSelection::default(), now(), &Utc);
        assert!(series.is_empty());
        assert_eq!(series.value_bounds(), None);

        series.values = vec![1.0, 1.0];
        let (lo, hi) = series.value_bounds().unwrap();
        assert!(lo < 1.0 && hi > 1.0);

        series.values = vec![1.0, 2.0];
        let (lo, hi) = series.value_bounds().unwrap();
        assert_relative_eq!(lo, 0.95);
        assert_relative_eq!(hi, 2.05);
    }
}

// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::models::{AggregatedBucket, Interval, RateSample};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;

struct Accumulator {
    sum: f64,
    count: usize,
    earliest: DateTime<Utc>,
}

/// Group samples by their timestamp truncated to `interval` in `tz` and average each group.
///
/// The order of the returned buckets is unspecified. Callers sort them by `start` before
/// presenting them (see `pipeline::sort_chronologically`).
pub fn aggregate_by_interval<Tz: TimeZone>(
    samples: &[RateSample],
    interval: Interval,
    tz: &Tz,
) -> Vec<AggregatedBucket> {
    let mut grouped: HashMap<NaiveDateTime, Accumulator> = HashMap::new();

    for sample in samples {
        let local = sample.timestamp.with_timezone(tz).naive_local();
        let key = interval.truncate(local);

        grouped
            .entry(key)
            .and_modify(|acc| {
                acc.sum += sample.conversion_rate;
                acc.count += 1;
                acc.earliest = acc.earliest.min(sample.timestamp);
            })
            .or_insert(Accumulator {
                sum: sample.conversion_rate,
                count: 1,
                earliest: sample.timestamp,
            });
    }

    grouped
        .into_iter()
        .map(|(key, acc)| {
            // A truncated local time can fall into a DST gap; fall back to the earliest member
            let start = tz
                .from_local_datetime(&key)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(acc.earliest);

            AggregatedBucket {
                key: key.format(interval.key_format()).to_string(),
                start,
                conversion_rate: acc.sum / acc.count as f64,
                samples: acc.count,
            }
        })
        .collect()
}

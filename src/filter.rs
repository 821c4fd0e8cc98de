// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::models::{RateSample, TimeRange};
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Keep the samples that fall inside the trailing `range` window ending at `now`.
///
/// The lower bound is inclusive. `TimeRange::AllTime` hands back the input untouched.
pub fn filter_by_range<'a>(
    samples: &'a [RateSample],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Cow<'a, [RateSample]> {
    match range.window() {
        None => Cow::Borrowed(samples),
        Some(window) => {
            let cutoff = now - window;
            Cow::Owned(
                samples
                    .iter()
                    .filter(|sample| sample.timestamp >= cutoff)
                    .copied()
                    .collect(),
            )
        }
    }
}

// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `GET /conversion-rate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRateResponse {
    pub conversion_rate: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One element of the `GET /historical-rates` array, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRateSample {
    pub timestamp: String,
    pub conversion_rate: f64,
}

/// Error body the server sends alongside a non-2xx status
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
}

/// Why a sample from the wire was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),
    #[error("non-finite conversion rate {0}")]
    NonFiniteRate(f64),
}

/// The latest conversion rate as reported by the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentRate {
    pub conversion_rate: f64,
    pub as_of: Option<DateTime<Utc>>,
}

impl TryFrom<CurrentRateResponse> for CurrentRate {
    type Error = SampleError;

    fn try_from(raw: CurrentRateResponse) -> Result<Self, Self::Error> {
        if !raw.conversion_rate.is_finite() {
            return Err(SampleError::NonFiniteRate(raw.conversion_rate));
        }

        // The timestamp is informational only, so a bad one is dropped rather than rejected
        let as_of = raw.timestamp.as_deref().and_then(|ts| {
            let parsed = parse_timestamp(ts);
            if parsed.is_none() {
                tracing::warn!("Ignoring unparseable current-rate timestamp '{}'", ts);
            }
            parsed
        });

        Ok(Self {
            conversion_rate: raw.conversion_rate,
            as_of,
        })
    }
}

/// A validated historical sample. Never modified after it is fetched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub conversion_rate: f64,
}

impl RateSample {
    pub fn new(timestamp: DateTime<Utc>, conversion_rate: f64) -> Self {
        Self {
            timestamp,
            conversion_rate,
        }
    }
}

impl TryFrom<&RawRateSample> for RateSample {
    type Error = SampleError;

    fn try_from(raw: &RawRateSample) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&raw.timestamp)
            .ok_or_else(|| SampleError::Timestamp(raw.timestamp.clone()))?;

        if !raw.conversion_rate.is_finite() {
            return Err(SampleError::NonFiniteRate(raw.conversion_rate));
        }

        Ok(Self::new(timestamp, raw.conversion_rate))
    }
}

/// One averaged point of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedBucket {
    /// Truncated timestamp in the display time zone, e.g. `2024-10-01 14:05`
    pub key: String,
    /// First instant covered by the bucket
    pub start: DateTime<Utc>,
    /// Mean of all member rates
    pub conversion_rate: f64,
    /// Number of samples averaged into this bucket
    pub samples: usize,
}

/// Parse an ISO-8601 timestamp.
///
/// Offsets are honoured (`2024-10-01T12:00:00.123456+00:00`, `...Z`). Timestamps without an
/// offset are taken to be UTC, which is what the tracker backend stores.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

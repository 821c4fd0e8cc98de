// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::error::FetchError;
use super::RateSource;
use crate::models::{
    CurrentRate, CurrentRateResponse, ErrorResponse, RateSample, RawRateSample,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

const CONVERSION_RATE_PATH: &str = "conversion-rate";
const HISTORICAL_RATES_PATH: &str = "historical-rates";

/// HTTP client for the tracker backend
#[derive(Clone)]
pub struct PufferClient {
    client: Client,
    base_url: String,
}

impl PufferClient {
    /// Build a client that gives up on requests after `timeout`. `None` waits forever.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl RateSource for PufferClient {
    async fn fetch_current_rate(&self) -> Result<CurrentRate, FetchError> {
        let url = self.endpoint(CONVERSION_RATE_PATH);
        let text = self.get_text(&url).await?;
        parse_current_rate(&url, &text)
    }

    async fn fetch_historical_rates(&self) -> Result<Vec<RateSample>, FetchError> {
        let url = self.endpoint(HISTORICAL_RATES_PATH);
        let text = self.get_text(&url).await?;
        parse_historical_rates(&url, &text)
    }
}

/// Pull the `error` field out of a failure body, or fall back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| body.trim().to_string())
}

pub fn parse_current_rate(url: &str, body: &str) -> Result<CurrentRate, FetchError> {
    let raw: CurrentRateResponse =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;

    CurrentRate::try_from(raw).map_err(|source| FetchError::InvalidSample {
        url: url.to_string(),
        index: 0,
        source,
    })
}

/// Decode and validate the history. One bad sample rejects the whole response.
pub fn parse_historical_rates(url: &str, body: &str) -> Result<Vec<RateSample>, FetchError> {
    let raw: Vec<RawRateSample> =
        serde_json::from_str(body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;

    raw.iter()
        .enumerate()
        .map(|(index, sample)| {
            RateSample::try_from(sample).map_err(|source| FetchError::InvalidSample {
                url: url.to_string(),
                index,
                source,
            })
        })
        .collect()
}

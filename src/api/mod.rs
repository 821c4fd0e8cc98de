pub mod error;
pub mod puffer_client;

pub use error::FetchError;
pub use puffer_client::{PufferClient, DEFAULT_BASE_URL};

use async_trait::async_trait;

use crate::models::{CurrentRate, RateSample};

/// Source of the two datasets the dashboard shows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_current_rate(&self) -> Result<CurrentRate, FetchError>;
    async fn fetch_historical_rates(&self) -> Result<Vec<RateSample>, FetchError>;
}

/// Fetch the current rate once. Failures are logged and come back as `None`.
pub async fn load_current_rate(source: &dyn RateSource) -> Option<CurrentRate> {
    match source.fetch_current_rate().await {
        Ok(rate) => {
            tracing::info!("Fetched current conversion rate {}", rate.conversion_rate);
            Some(rate)
        }
        Err(e) => {
            tracing::error!("Error fetching conversion rate: {}", e);
            None
        }
    }
}

/// Fetch the history once. Failures are logged and come back as `None`.
pub async fn load_historical_rates(source: &dyn RateSource) -> Option<Vec<RateSample>> {
    match source.fetch_historical_rates().await {
        Ok(samples) => {
            tracing::info!("Fetched {} historical rates", samples.len());
            Some(samples)
        }
        Err(e) => {
            tracing::error!("Error fetching historical rates: {}", e);
            None
        }
    }
}

// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::models::SampleError;
use thiserror::Error;

/// Anything that can go wrong between sending a request and holding validated data.
///
/// Callers only distinguish success from failure; the variants exist for the log line.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sample #{index} from {url} is invalid: {source}")]
    InvalidSample {
        url: String,
        index: usize,
        #[source]
        source: SampleError,
    },
}

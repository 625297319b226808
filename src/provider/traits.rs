// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Provider response has no 'result' list")]
    MissingResult,
}

/// One provider response: the verbatim payload plus its decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPage {
    pub raw: Value,
    pub result: Vec<Value>,
    pub have_more: bool,
}

impl ProviderPage {
    /// Split a decoded body into its `result` list and `have_more` flag.
    /// A missing `have_more` means no further pages.
    pub fn from_payload(raw: Value) -> Result<Self, FetchError> {
        let result = raw
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .ok_or(FetchError::MissingResult)?;
        let have_more = raw.get("have_more").and_then(Value::as_bool).unwrap_or(false);

        Ok(Self {
            raw,
            result,
            have_more,
        })
    }
}

#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Fetch the next page of the provider-driven full crawl
    async fn fetch_page(&self) -> Result<ProviderPage, FetchError>;

    /// Fetch current state for a bounded set of ids. Unknown ids are absent
    /// from the result.
    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<ProviderPage, FetchError>;
}

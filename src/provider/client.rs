// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::provider::traits::{FetchError, ListingProvider, ProviderPage};

const AUTH_IDENTIFIER_HEADER: &str = "x-auth-identifier";
const AUTH_KEY_HEADER: &str = "x-auth-key";

/// HTTP client for the car.info classifieds endpoint.
#[derive(Debug, Clone)]
pub struct CarInfoClient {
    client: Client,
    endpoint: String,
}

impl CarInfoClient {
    pub fn new(
        endpoint: String,
        auth_identifier: &str,
        auth_key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_IDENTIFIER_HEADER, HeaderValue::from_str(auth_identifier)?);
        let mut key = HeaderValue::from_str(auth_key)?;
        key.set_sensitive(true);
        headers.insert(AUTH_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("car-ads-sync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, endpoint })
    }

    async fn send(&self, request: RequestBuilder) -> Result<ProviderPage, FetchError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Provider request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Decode by hand so malformed bodies surface as `Decode`, not `Transport`
        let bytes = response.bytes().await?;
        let raw = serde_json::from_slice(&bytes)?;
        let page = ProviderPage::from_payload(raw)?;

        debug!(
            count = page.result.len(),
            have_more = page.have_more,
            "Received provider page"
        );
        Ok(page)
    }
}

#[async_trait]
impl ListingProvider for CarInfoClient {
    async fn fetch_page(&self) -> Result<ProviderPage, FetchError> {
        info!(endpoint = %self.endpoint, "Fetching crawl page from provider");
        self.send(self.client.get(&self.endpoint)).await
    }

    async fn fetch_by_ids(&self, ids: &[i64]) -> Result<ProviderPage, FetchError> {
        info!(count = ids.len(), "Fetching listings by id from provider");
        self.send(self.client.post(&self.endpoint).json(ids)).await
    }
}

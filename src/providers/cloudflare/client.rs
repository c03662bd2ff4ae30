use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::providers::cloudflare::error::CloudflareProviderError;
use crate::providers::cloudflare::types::*;

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

pub struct CloudflareConfig {
    pub api_base: String,
    pub api_token: String,
    pub min_request_interval: Duration,
}

pub struct CloudflareProvider {
    config: CloudflareConfig,
    client: Client,
    rate_limiter: RateLimiter,
}

#[derive(Clone)]
struct RateLimiter {
    last_request: Arc<Mutex<Option<Instant>>>,
    min_delay: Duration,
}

impl RateLimiter {
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl CloudflareProvider {
    pub fn new(config: CloudflareConfig) -> Result<Self, CloudflareProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let rate_limiter = RateLimiter {
            last_request: Arc::new(Mutex::new(None)),
            min_delay: config.min_request_interval,
        };

        Ok(Self {
            config: CloudflareConfig {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                ..config
            },
            client,
            rate_limiter,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn handle_request<T>(
        &self,
        request: RequestBuilder,
    ) -> Result<CloudflareEnvelope<T>, CloudflareProviderError>
    where
        T: DeserializeOwned,
    {
        self.rate_limiter.wait().await;
        let response = request.bearer_auth(&self.config.api_token).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(CloudflareProviderError::RateLimited { retry_after });
        }

        let body = response.text().await?;
        match serde_json::from_str::<CloudflareEnvelope<T>>(&body) {
            Ok(envelope) if status.is_success() && envelope.success => Ok(envelope),
            Ok(envelope) => Err(CloudflareProviderError::from_messages(
                status.as_u16(),
                &envelope.errors,
            )),
            Err(e) if status.is_success() => Err(CloudflareProviderError::Decode(e.to_string())),
            Err(_) => Err(CloudflareProviderError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
        }
    }

    fn require_result<T>(envelope: CloudflareEnvelope<T>) -> Result<T, CloudflareProviderError> {
        envelope
            .result
            .ok_or_else(|| CloudflareProviderError::Decode("response has no result".to_string()))
    }

    pub async fn list_zones_named(
        &self,
        name: &str,
    ) -> Result<Vec<CloudflareZone>, CloudflareProviderError> {
        debug!(name, "Listing Cloudflare zones");
        let request = self.client.get(self.url("/zones")).query(&[("name", name)]);
        Self::require_result(self.handle_request(request).await?)
    }

    pub async fn list_dns_records(
        &self,
        zone_id: &str,
        record_type: &str,
        name: &str,
    ) -> Result<Vec<CloudflareRecord>, CloudflareProviderError> {
        let url = self.url(&format!("/zones/{zone_id}/dns_records"));
        let request = self
            .client
            .get(url)
            .query(&[("type", record_type), ("name", name)]);
        Self::require_result(self.handle_request(request).await?)
    }

    pub async fn create_dns_record(
        &self,
        zone_id: &str,
        req: &CreateRecordRequest,
    ) -> Result<CloudflareRecord, CloudflareProviderError> {
        let url = self.url(&format!("/zones/{zone_id}/dns_records"));
        Self::require_result(self.handle_request(self.client.post(url).json(req)).await?)
    }

    pub async fn delete_dns_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<(), CloudflareProviderError> {
        let url = self.url(&format!("/zones/{zone_id}/dns_records/{record_id}"));
        self.handle_request::<serde_json::Value>(self.client.delete(url))
            .await
            .map(|_| ())
    }
}

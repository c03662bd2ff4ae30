//! Topic relay over HTTP, authenticated with the current identity-plane session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::session::SessionHandle;
use crate::core::channel::MessageChannel;
use crate::error::Error;

pub const DEFAULT_TOPIC_IN: &str = "acme:requests";
pub const DEFAULT_TOPIC_OUT: &str = "acme:events";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_host: String,
    pub topic_in: String,
    pub topic_out: String,
    pub consumer: String,
}

#[derive(Deserialize)]
struct Delivery {
    payload: Value,
}

pub struct HttpRelayChannel {
    config: RelayConfig,
    client: Client,
    session: SessionHandle,
}

impl HttpRelayChannel {
    pub fn new(
        config: RelayConfig,
        session: SessionHandle,
        ca_cert_pem: Option<&str>,
    ) -> Result<Self, Error> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(pem) = ca_cert_pem {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::ConfigError(format!("invalid API CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: RelayConfig {
                api_host: config.api_host.trim_end_matches('/').to_string(),
                ..config
            },
            client,
            session,
        })
    }

    fn topic_url(&self, topic: &str, suffix: &str) -> String {
        format!("{}/v1/relay/topics/{topic}/{suffix}", self.config.api_host)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let token = self.session.token()?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::ChannelError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::CredentialError(format!("relay rejected session: HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ChannelError(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl MessageChannel for HttpRelayChannel {
    async fn receive(&mut self) -> Result<Option<Value>, Error> {
        let request = self
            .client
            .get(self.topic_url(&self.config.topic_in, "next"))
            .query(&[("consumer", self.config.consumer.as_str())]);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let delivery: Delivery = response
            .json()
            .await
            .map_err(|e| Error::ChannelError(format!("malformed delivery: {e}")))?;
        debug!(topic = %self.config.topic_in, "Received relay message");
        Ok(Some(delivery.payload))
    }

    async fn produce(&mut self, payload: &Value) -> Result<(), Error> {
        let request = self
            .client
            .post(self.topic_url(&self.config.topic_out, "messages"))
            .json(payload);
        self.send(request).await.map(|_| ())
    }
}

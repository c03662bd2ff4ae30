//! Approle login and token refresh against the Strongbox identity plane.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder};
use serde::Serialize;

use crate::auth::credentials::IdentityPlane;
use crate::auth::session::SessionGrant;
use crate::error::Error;

const USER_AGENT: &str = concat!("acme-dns-relay/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct ApproleLogin<'a> {
    #[serde(rename = "role-id")]
    role_id: &'a str,
    #[serde(rename = "secret-id")]
    secret_id: &'a str,
}

pub struct StrongboxClient {
    api_host: String,
    client: Client,
}

impl StrongboxClient {
    pub fn new(api_host: &str, ca_cert_pem: Option<&str>) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT);
        if let Some(pem) = ca_cert_pem {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::ConfigError(format!("invalid API CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_host: api_host.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn exchange(&self, request: RequestBuilder) -> Result<SessionGrant, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::CredentialError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CredentialError(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::CredentialError(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl IdentityPlane for StrongboxClient {
    async fn login(&self, role_id: &str, secret_id: &str) -> Result<SessionGrant, Error> {
        let url = format!("{}/v1/approle-login", self.api_host);
        self.exchange(self.client.post(url).json(&ApproleLogin { role_id, secret_id }))
            .await
    }

    async fn refresh(&self, token: &str) -> Result<SessionGrant, Error> {
        let url = format!("{}/v1/state/strongbox/token/refresh", self.api_host);
        self.exchange(self.client.post(url).bearer_auth(token)).await
    }
}

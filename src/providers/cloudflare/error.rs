use crate::providers::cloudflare::types::CloudflareMessage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudflareProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloudflare API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl CloudflareProviderError {
    pub fn from_messages(status: u16, errors: &[CloudflareMessage]) -> Self {
        let message = if errors.is_empty() {
            "unknown error".to_string()
        } else {
            errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; ")
        };
        CloudflareProviderError::Api { status, message }
    }
}

use crate::error::Error;

pub fn map_error(e: CloudflareProviderError) -> Error {
    use CloudflareProviderError::*;
    match e {
        Http(err) => Error::provider(err.status().map(|s| s.as_u16()), err.to_string()),
        Api { status, message } => Error::provider(Some(status), message),
        RateLimited { retry_after } => Error::provider(
            Some(429),
            format!("rate limited, retry after {retry_after}s"),
        ),
        Decode(msg) => Error::provider(None, msg),
    }
}

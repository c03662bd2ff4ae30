use std::fmt;

use serde::Serialize;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidInput(String),
    ZoneNotFound(String),
    ProviderError { status: Option<u16>, message: String },
    CredentialError(String),
    ChannelError(String),
    ConfigError(String),
    Other(String),
}

/// Error classification reported back to message producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    Provider,
    ZoneNotFound,
    Internal,
}

impl Error {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::ProviderError {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::Validation,
            Error::ZoneNotFound(_) => ErrorKind::ZoneNotFound,
            Error::ProviderError { .. } => ErrorKind::Provider,
            Error::CredentialError(_)
            | Error::ChannelError(_)
            | Error::ConfigError(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::ZoneNotFound(fqdn) => write!(f, "No zone found for {fqdn}"),
            Error::ProviderError {
                status: Some(status),
                message,
            } => write!(f, "Provider error (HTTP {status}): {message}"),
            Error::ProviderError {
                status: None,
                message,
            } => write!(f, "Provider error: {message}"),
            Error::CredentialError(msg) => write!(f, "Credential error: {msg}"),
            Error::ChannelError(msg) => write!(f, "Channel error: {msg}"),
            Error::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Error::Other(msg) => write!(f, "Other error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::InvalidInput("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::ZoneNotFound("x".into()).kind(), ErrorKind::ZoneNotFound);
        assert_eq!(Error::provider(Some(403), "denied").kind(), ErrorKind::Provider);
        assert_eq!(Error::CredentialError("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::ChannelError("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::Other("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_provider_display_includes_status() {
        let err = Error::provider(Some(403), "Authentication error");
        assert_eq!(err.to_string(), "Provider error (HTTP 403): Authentication error");
        let err = Error::provider(None, "connection reset");
        assert_eq!(err.to_string(), "Provider error: connection reset");
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::ZoneNotFound).unwrap();
        assert_eq!(json, "\"zone-not-found\"");
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Action::Add),
            "remove" => Some(Action::Remove),
            _ => None,
        }
    }
}

/// Challenge instruction as it arrives on the wire. Every field is optional here so
/// that a malformed request can still be acknowledged with its correlation id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
}

impl RequestPayload {
    /// Lower-cased action as echoed back in the acknowledgement.
    pub fn action_label(&self) -> String {
        self.action
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    pub fn validate(&self, default_ttl: u32) -> Result<ChallengeRequest, Error> {
        let label = self.action_label();
        let action = Action::parse(&label)
            .ok_or_else(|| Error::InvalidInput(format!("Unsupported action: {label:?}")))?;

        let name = self.name.as_deref().unwrap_or_default();
        let value = self.value.as_deref().unwrap_or_default();
        if name.is_empty() || value.is_empty() {
            return Err(Error::InvalidInput(
                "Both 'name' and 'value' are required".to_string(),
            ));
        }

        Ok(ChallengeRequest {
            id: self.id.clone(),
            action,
            domain: self.domain.clone().unwrap_or_default(),
            name: name.to_string(),
            value: value.to_string(),
            ttl: self.ttl.filter(|ttl| *ttl > 0).unwrap_or(default_ttl),
        })
    }
}

/// A validated challenge instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    pub id: Option<String>,
    pub action: Action,
    pub domain: String,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: String,
    pub name: String,
    pub value: String,
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    /// `Some(None)` serializes as an explicit `null` (remove of an absent record).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AckError>,
}

impl ChallengeAck {
    fn base(payload: &RequestPayload, status: AckStatus) -> Self {
        Self {
            id: payload.id.clone(),
            action: payload.action_label(),
            name: payload.name.clone().unwrap_or_default(),
            value: payload.value.clone().unwrap_or_default(),
            status,
            zone_id: None,
            record_id: None,
            error: None,
        }
    }

    pub fn ok(payload: &RequestPayload, zone_id: &str, record_id: Option<String>) -> Self {
        Self {
            zone_id: Some(zone_id.to_string()),
            record_id: Some(record_id),
            ..Self::base(payload, AckStatus::Ok)
        }
    }

    pub fn failed(payload: &RequestPayload, err: &Error) -> Self {
        Self {
            error: Some(AckError {
                kind: err.kind(),
                message: err.to_string(),
            }),
            ..Self::base(payload, AckStatus::Error)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}

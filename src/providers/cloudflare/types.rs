use serde::{Deserialize, Serialize};

use crate::core::record::{DNSRecord, DNSRecordType, NewDNSRecord, Zone};

/// Cloudflare v4 response envelope.
#[derive(Deserialize, Debug)]
pub struct CloudflareEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<CloudflareMessage>,
    pub result: Option<T>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CloudflareMessage {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CloudflareRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: Option<u32>,
}

#[derive(Serialize, Debug)]
pub struct CreateRecordRequest {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

pub fn to_zone(zone: CloudflareZone) -> Zone {
    Zone {
        id: zone.id,
        name: zone.name,
    }
}

/// `None` for record types this service never manages.
pub fn to_dns_record(record: CloudflareRecord) -> Option<DNSRecord> {
    Some(DNSRecord {
        record_type: DNSRecordType::parse(&record.record_type)?,
        id: record.id,
        name: record.name,
        content: record.content,
        ttl: record.ttl,
    })
}

pub fn to_create_request(record: &NewDNSRecord) -> CreateRecordRequest {
    CreateRecordRequest {
        record_type: record.record_type.as_str().to_string(),
        name: record.name.clone(),
        content: record.content.clone(),
        ttl: record.ttl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dns_record() {
        let record = CloudflareRecord {
            id: "372e67954025e0ba6aaa6d586b9e0b59".to_string(),
            record_type: "TXT".to_string(),
            name: "_acme-challenge.example.com".to_string(),
            content: "token".to_string(),
            ttl: Some(120),
        };
        let dns = to_dns_record(record).unwrap();
        assert_eq!(dns.record_type, DNSRecordType::TXT);
        assert_eq!(dns.id, "372e67954025e0ba6aaa6d586b9e0b59");
        assert_eq!(dns.content, "token");
        assert_eq!(dns.ttl, Some(120));
    }

    #[test]
    fn test_to_dns_record_unknown_type() {
        let record = CloudflareRecord {
            id: "abc".to_string(),
            record_type: "MX".to_string(),
            name: "example.com".to_string(),
            content: "mail.example.com".to_string(),
            ttl: None,
        };
        assert!(to_dns_record(record).is_none());
    }

    #[test]
    fn test_create_request_wire_format() {
        let req = to_create_request(&NewDNSRecord::txt("_acme-challenge.example.com", "tok", 60));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "type": "TXT",
                "name": "_acme-challenge.example.com",
                "content": "tok",
                "ttl": 60
            })
        );
    }

    #[test]
    fn test_envelope_with_errors() {
        let envelope: CloudflareEnvelope<Vec<CloudflareZone>> = serde_json::from_str(
            r#"{"success": false, "errors": [{"code": 10000, "message": "Authentication error"}], "result": null}"#,
        )
        .unwrap();
        assert!(!envelope.success);
        assert!(envelope.result.is_none());
        assert_eq!(envelope.errors[0].code, 10000);
    }
}

use std::fmt;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DNSRecordType {
    TXT,
}

impl DNSRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DNSRecordType::TXT => "TXT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TXT" => Some(DNSRecordType::TXT),
            _ => None,
        }
    }
}

impl fmt::Display for DNSRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider zone. Resolved, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// A record as it exists on the provider side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DNSRecord {
    pub id: String,
    pub record_type: DNSRecordType,
    pub name: String,
    pub content: String,
    pub ttl: Option<u32>,
}

/// A record to be created. The provider assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDNSRecord {
    pub record_type: DNSRecordType,
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

impl NewDNSRecord {
    pub fn txt(name: &str, content: &str, ttl: u32) -> Self {
        Self {
            record_type: DNSRecordType::TXT,
            name: name.to_string(),
            content: content.to_string(),
            ttl,
        }
    }
}

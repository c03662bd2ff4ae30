//! Cloudflare v4 provider implementation

pub mod client;
pub mod error;
pub mod types;


pub use client::{CloudflareConfig, CloudflareProvider};
pub use error::CloudflareProviderError;

// --- DNSProvider trait implementation for CloudflareProvider ---
use crate::core::provider::DNSProvider;
use crate::core::record::{DNSRecord, DNSRecordType, NewDNSRecord, Zone};
use crate::error::Error;
use async_trait::async_trait;
use error::map_error;
use types::{to_create_request, to_dns_record, to_zone};

#[async_trait]
impl DNSProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>, Error> {
        self.list_zones_named(name)
            .await
            .map(|zones| zones.into_iter().map(to_zone).collect())
            .map_err(map_error)
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: DNSRecordType,
        name: &str,
    ) -> Result<Vec<DNSRecord>, Error> {
        self.list_dns_records(zone_id, record_type.as_str(), name)
            .await
            .map(|records| records.into_iter().filter_map(to_dns_record).collect())
            .map_err(map_error)
    }

    async fn create_record(&self, zone_id: &str, record: NewDNSRecord) -> Result<DNSRecord, Error> {
        let created = self
            .create_dns_record(zone_id, &to_create_request(&record))
            .await
            .map_err(map_error)?;
        Ok(DNSRecord {
            id: created.id,
            record_type: record.record_type,
            name: created.name,
            content: created.content,
            ttl: created.ttl,
        })
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), Error> {
        self.delete_dns_record(zone_id, record_id)
            .await
            .map_err(map_error)
    }
}

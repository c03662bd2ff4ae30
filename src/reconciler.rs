use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::provider::DNSProvider;
use crate::core::record::{DNSRecord, DNSRecordType, NewDNSRecord};
use crate::error::Error;

/// Idempotent add/remove of challenge TXT records within a resolved zone.
pub struct RecordReconciler {
    provider: Arc<dyn DNSProvider>,
    verify_delay: Duration,
}

impl RecordReconciler {
    pub fn new(provider: Arc<dyn DNSProvider>) -> Self {
        Self {
            provider,
            verify_delay: Duration::from_millis(500),
        }
    }

    /// Delay before reading a freshly created record back.
    pub fn with_verify_delay(mut self, verify_delay: Duration) -> Self {
        self.verify_delay = verify_delay;
        self
    }

    pub async fn list(&self, zone_id: &str, name: &str) -> Result<Vec<DNSRecord>, Error> {
        self.provider
            .list_records(zone_id, DNSRecordType::TXT, name)
            .await
    }

    /// Returns the id of the record holding `value`, creating it only if absent.
    pub async fn add(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
        ttl: u32,
    ) -> Result<String, Error> {
        let existing = self.list(zone_id, name).await?;
        log_existing(name, value, &existing);

        if let Some(record) = existing.iter().find(|r| r.content == value) {
            info!(record_id = %record.id, name, "Reusing existing TXT record");
            return Ok(record.id.clone());
        }

        info!(name, ttl, "Creating TXT record");
        let created = self
            .provider
            .create_record(zone_id, NewDNSRecord::txt(name, value, ttl))
            .await?;
        info!(record_id = %created.id, name, zone_id, "Created TXT record");

        self.verify_created(zone_id, name, value).await;
        Ok(created.id)
    }

    /// Deletes only the record whose content equals `value`. `None` if it was already gone.
    pub async fn remove(
        &self,
        zone_id: &str,
        name: &str,
        value: &str,
    ) -> Result<Option<String>, Error> {
        let existing = self.list(zone_id, name).await?;
        log_existing(name, value, &existing);

        let Some(target) = existing.into_iter().find(|r| r.content == value) else {
            info!(name, "Target TXT record not found, nothing to remove");
            return Ok(None);
        };

        info!(record_id = %target.id, name, zone_id, "Deleting TXT record");
        self.provider.delete_record(zone_id, &target.id).await?;
        info!(record_id = %target.id, name, "Deleted TXT record");
        Ok(Some(target.id))
    }

    async fn verify_created(&self, zone_id: &str, name: &str, value: &str) {
        if !self.verify_delay.is_zero() {
            tokio::time::sleep(self.verify_delay).await;
        }
        match self.list(zone_id, name).await {
            Ok(records) if records.iter().any(|r| r.content == value) => {
                debug!(name, "Verified TXT record is listed by the provider");
            }
            Ok(_) => warn!(name, "Could not immediately verify TXT record"),
            Err(e) => warn!(name, error = %e, "Could not verify TXT record creation"),
        }
    }
}

fn log_existing(name: &str, value: &str, existing: &[DNSRecord]) {
    if existing.is_empty() {
        debug!(name, "No existing TXT records");
        return;
    }
    debug!(name, count = existing.len(), "Found existing TXT records");
    for record in existing {
        let matches = record.content == value;
        debug!(
            record_id = %record.id,
            content = %record.content,
            ttl = ?record.ttl,
            matches,
            "Existing TXT record"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::MockDNSProvider;
    use crate::core::provider::mock::FakeProvider;
    use assert_matches::assert_matches;

    const NAME: &str = "_acme-challenge.example.com";

    fn reconciler(provider: Arc<FakeProvider>) -> RecordReconciler {
        RecordReconciler::new(provider).with_verify_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let provider = Arc::new(FakeProvider::new());
        let reconciler = reconciler(provider.clone());

        let first = reconciler.add("zone-1", NAME, "token", 120).await.unwrap();
        let second = reconciler.add("zone-1", NAME, "token", 120).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.creates(), 1);
        assert_eq!(provider.txt_contents(NAME), vec!["token"]);
    }

    #[tokio::test]
    async fn test_add_leaves_other_values_alone() {
        let provider = Arc::new(FakeProvider::new().with_txt("zone-1", NAME, "other"));
        let reconciler = reconciler(provider.clone());

        reconciler.add("zone-1", NAME, "token", 120).await.unwrap();

        let mut contents = provider.txt_contents(NAME);
        contents.sort();
        assert_eq!(contents, vec!["other", "token"]);
        assert_eq!(provider.deletes(), 0);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let provider = Arc::new(FakeProvider::new());
        let reconciler = reconciler(provider.clone());

        let removed = reconciler.remove("zone-1", NAME, "never-added").await.unwrap();
        assert_eq!(removed, None);
        assert_eq!(provider.deletes(), 0);
    }

    #[tokio::test]
    async fn test_remove_is_selective() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_txt("zone-1", NAME, "first")
                .with_txt("zone-1", NAME, "second"),
        );
        let reconciler = reconciler(provider.clone());

        let removed = reconciler.remove("zone-1", NAME, "first").await.unwrap();
        assert!(removed.is_some());
        assert_eq!(provider.txt_contents(NAME), vec!["second"]);
        assert_eq!(provider.deletes(), 1);
    }

    #[tokio::test]
    async fn test_add_propagates_create_failure() {
        let provider = Arc::new(
            FakeProvider::new().fail_writes(Error::provider(Some(400), "Invalid TTL")),
        );
        let reconciler = reconciler(provider);

        let result = reconciler.add("zone-1", NAME, "token", 120).await;
        assert_matches!(result, Err(Error::ProviderError { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_add_hit_makes_no_mutation() {
        let mut provider = MockDNSProvider::new();
        provider
            .expect_list_records()
            .times(1)
            .returning(|_, _, name| {
                Ok(vec![DNSRecord {
                    id: "rec-7".to_string(),
                    record_type: DNSRecordType::TXT,
                    name: name.to_string(),
                    content: "token".to_string(),
                    ttl: Some(120),
                }])
            });
        provider.expect_create_record().never();
        let reconciler = RecordReconciler::new(Arc::new(provider));

        let id = reconciler.add("zone-1", NAME, "token", 120).await.unwrap();
        assert_eq!(id, "rec-7");
    }
}

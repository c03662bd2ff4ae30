use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::provider::DNSProvider;
use crate::core::record::Zone;
use crate::error::Error;

/// Candidate zone names for `fqdn`, longest first, never shorter than two labels.
pub fn zone_candidates(fqdn: &str) -> Vec<String> {
    let labels: Vec<&str> = fqdn.trim_end_matches('.').split('.').collect();
    (0..labels.len().saturating_sub(1))
        .map(|i| labels[i..].join("."))
        .collect()
}

pub struct ZoneResolver {
    provider: Arc<dyn DNSProvider>,
}

impl ZoneResolver {
    pub fn new(provider: Arc<dyn DNSProvider>) -> Self {
        Self { provider }
    }

    pub async fn resolve(&self, fqdn: &str) -> Result<Zone, Error> {
        let mut answered = false;
        let mut last_error = None;

        for candidate in zone_candidates(fqdn) {
            match self.provider.list_zones(&candidate).await {
                Ok(zones) => {
                    answered = true;
                    if let Some(zone) = zones.into_iter().next() {
                        debug!(fqdn, zone_id = %zone.id, zone_name = %zone.name, "Resolved zone");
                        return Ok(zone);
                    }
                }
                Err(e) => {
                    warn!(fqdn, candidate = %candidate, error = %e, "Zone lookup failed, trying next candidate");
                    last_error = Some(e);
                }
            }
        }

        // Only a provider that never answered is reported as a provider failure.
        match last_error {
            Some(err @ Error::ProviderError { .. }) if !answered => Err(err),
            _ => Err(Error::ZoneNotFound(fqdn.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::mock::FakeProvider;
    use crate::core::provider::MockDNSProvider;
    use assert_matches::assert_matches;

    #[test]
    fn test_zone_candidates() {
        assert_eq!(
            zone_candidates("_acme-challenge.www.example.co.uk"),
            vec![
                "_acme-challenge.www.example.co.uk",
                "www.example.co.uk",
                "example.co.uk",
                "co.uk",
            ]
        );
        assert_eq!(zone_candidates("example.com."), vec!["example.com"]);
        assert!(zone_candidates("localhost").is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_registered_zone() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_zone("zone-uk", "example.co.uk")
                .with_zone("zone-co", "co.uk"),
        );
        let resolver = ZoneResolver::new(provider.clone());

        let zone = resolver
            .resolve("_acme-challenge.www.example.co.uk")
            .await
            .unwrap();
        assert_eq!(zone.id, "zone-uk");
        assert_eq!(zone.name, "example.co.uk");
        assert_eq!(
            provider.zone_queries(),
            vec![
                "_acme-challenge.www.example.co.uk",
                "www.example.co.uk",
                "example.co.uk",
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_skips_failing_candidate() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_zone("zone-1", "example.com")
                .fail_zone_query("www.example.com"),
        );
        let resolver = ZoneResolver::new(provider.clone());

        let zone = resolver
            .resolve("_acme-challenge.www.example.com")
            .await
            .unwrap();
        assert_eq!(zone.id, "zone-1");
        assert_eq!(provider.zone_queries().len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_exhausted_is_zone_not_found() {
        let provider = Arc::new(FakeProvider::new().with_zone("zone-1", "example.org"));
        let resolver = ZoneResolver::new(provider);

        let result = resolver.resolve("_acme-challenge.example.com").await;
        assert_matches!(result, Err(Error::ZoneNotFound(fqdn)) if fqdn == "_acme-challenge.example.com");
    }

    #[tokio::test]
    async fn test_resolve_reports_provider_outage() {
        let mut provider = MockDNSProvider::new();
        provider
            .expect_list_zones()
            .times(2)
            .returning(|_| Err(Error::provider(Some(403), "Authentication error")));
        let resolver = ZoneResolver::new(Arc::new(provider));

        let result = resolver.resolve("_acme-challenge.example.com").await;
        assert_matches!(result, Err(Error::ProviderError { status: Some(403), .. }));
    }
}

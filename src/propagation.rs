//! Read-only DNS propagation diagnostics for challenge records.
//!
//! Queries independent public resolvers for the challenge TXT record and compares the
//! answers with what the provider holds. Purely informational: nothing here feeds back
//! into reconciliation.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use tracing::{info, warn};

struct NamedResolver {
    label: &'static str,
    server: String,
    resolver: TokioResolver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOutcome {
    pub label: String,
    pub server: String,
    pub answer: Result<Vec<String>, String>,
}

impl ResolverOutcome {
    fn has(&self, expected: &str) -> bool {
        matches!(&self.answer, Ok(values) if values.iter().any(|v| v == expected))
    }
}

#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub fqdn: String,
    pub expected: String,
    pub provider_values: Vec<String>,
    pub resolutions: Vec<ResolverOutcome>,
    pub issues: Vec<String>,
}

pub struct PropagationProbe {
    resolvers: Vec<NamedResolver>,
}

impl Default for PropagationProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PropagationProbe {
    /// Cloudflare and Google public resolvers plus the system resolver, when available.
    pub fn new() -> Self {
        let mut resolvers = vec![
            public_resolver("Cloudflare", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
            public_resolver("Google", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        ];
        match Resolver::builder_tokio() {
            Ok(builder) => resolvers.push(NamedResolver {
                label: "System",
                server: "system".to_string(),
                resolver: builder.with_options(probe_options()).build(),
            }),
            Err(e) => warn!(error = %e, "System resolver unavailable for propagation checks"),
        }
        Self { resolvers }
    }

    pub async fn inspect(
        &self,
        fqdn: &str,
        expected: &str,
        provider_values: Vec<String>,
    ) -> PropagationReport {
        let mut resolutions = Vec::with_capacity(self.resolvers.len());
        for named in &self.resolvers {
            let answer = match named.resolver.txt_lookup(fqdn).await {
                Ok(lookup) => Ok(lookup
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|data| String::from_utf8_lossy(data))
                            .collect::<String>()
                    })
                    .collect()),
                Err(e) => Err(e.to_string()),
            };
            resolutions.push(ResolverOutcome {
                label: named.label.to_string(),
                server: named.server.clone(),
                answer,
            });
        }

        let issues = analyze(expected, &provider_values, &resolutions);
        PropagationReport {
            fqdn: fqdn.to_string(),
            expected: expected.to_string(),
            provider_values,
            resolutions,
            issues,
        }
    }
}

impl PropagationReport {
    pub fn log(&self) {
        info!(
            fqdn = %self.fqdn,
            provider_values = ?self.provider_values,
            "Provider TXT records"
        );
        if self.issues.is_empty() {
            info!(fqdn = %self.fqdn, "DNS verification passed, no issues detected");
        }
        for issue in &self.issues {
            warn!(fqdn = %self.fqdn, issue = %issue, "DNS verification issue");
        }
        for outcome in &self.resolutions {
            match &outcome.answer {
                Ok(_) => info!(
                    resolver = %outcome.label,
                    server = %outcome.server,
                    found = outcome.has(&self.expected),
                    "Challenge value lookup"
                ),
                Err(e) => warn!(
                    resolver = %outcome.label,
                    server = %outcome.server,
                    error = %e,
                    "Challenge value lookup failed"
                ),
            }
        }
    }
}

/// Common reasons an ACME server would fail to see the challenge value.
pub fn analyze(
    expected: &str,
    provider_values: &[String],
    resolutions: &[ResolverOutcome],
) -> Vec<String> {
    let mut issues = Vec::new();

    if provider_values.is_empty() {
        issues.push("No TXT records found at the provider".to_string());
    } else if !provider_values.iter().any(|v| v == expected) {
        issues.push("Expected value not found in provider records".to_string());
    }

    let answered = resolutions.iter().filter(|r| r.answer.is_ok()).count();
    let with_expected = resolutions.iter().filter(|r| r.has(expected)).count();
    if with_expected == 0 {
        issues.push("Challenge value not resolved by any tested DNS server".to_string());
    } else if with_expected < answered {
        issues.push("Challenge value not consistently resolved across DNS servers".to_string());
    }

    let distinct: BTreeSet<&str> = provider_values.iter().map(String::as_str).collect();
    if distinct.len() > 1 {
        let values: Vec<&str> = distinct.into_iter().collect();
        issues.push(format!(
            "Multiple conflicting TXT records found: {}",
            values.join(", ")
        ));
    }

    issues
}

fn probe_options() -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(5);
    opts.attempts = 2;
    opts.cache_size = 0;
    opts
}

fn public_resolver(label: &'static str, ip: IpAddr) -> NamedResolver {
    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(SocketAddr::new(ip, 53), Protocol::Udp));
    let resolver = Resolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(probe_options())
        .build();
    NamedResolver {
        label,
        server: ip.to_string(),
        resolver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(label: &str, answer: Result<Vec<&str>, &str>) -> ResolverOutcome {
        ResolverOutcome {
            label: label.to_string(),
            server: "192.0.2.1".to_string(),
            answer: answer
                .map(|values| values.into_iter().map(String::from).collect())
                .map_err(String::from),
        }
    }

    #[test]
    fn test_analyze_clean() {
        let issues = analyze(
            "tok",
            &["tok".to_string()],
            &[outcome("Cloudflare", Ok(vec!["tok"])), outcome("Google", Ok(vec!["tok"]))],
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_analyze_missing_everywhere() {
        let issues = analyze("tok", &[], &[outcome("Google", Err("NXDOMAIN"))]);
        assert_eq!(
            issues,
            vec![
                "No TXT records found at the provider",
                "Challenge value not resolved by any tested DNS server",
            ]
        );
    }

    #[test]
    fn test_analyze_inconsistent_and_conflicting() {
        let issues = analyze(
            "tok",
            &["tok".to_string(), "stale".to_string()],
            &[
                outcome("Cloudflare", Ok(vec!["tok", "stale"])),
                outcome("Google", Ok(vec!["stale"])),
                outcome("System", Err("timed out")),
            ],
        );
        assert_eq!(
            issues,
            vec![
                "Challenge value not consistently resolved across DNS servers",
                "Multiple conflicting TXT records found: stale, tok",
            ]
        );
    }

    #[test]
    fn test_analyze_value_missing_at_provider() {
        let issues = analyze(
            "tok",
            &["other".to_string()],
            &[outcome("Cloudflare", Ok(vec!["tok"]))],
        );
        assert_eq!(issues, vec!["Expected value not found in provider records"]);
    }
}

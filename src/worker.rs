use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::auth::credentials::CredentialManager;
use crate::config::Config;
use crate::core::channel::MessageChannel;
use crate::core::message::{Action, ChallengeAck, ChallengeRequest, RequestPayload};
use crate::core::provider::DNSProvider;
use crate::core::record::Zone;
use crate::error::Error;
use crate::propagation::PropagationProbe;
use crate::reconciler::RecordReconciler;
use crate::shutdown::Shutdown;
use crate::zone_resolver::ZoneResolver;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lower-cased domains owned by this instance. Empty means every domain.
    pub managed_domains: HashSet<String>,
    pub default_ttl: u32,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    /// Delay before a freshly created record is read back.
    pub verify_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            managed_domains: HashSet::new(),
            default_ttl: 120,
            poll_interval: Duration::from_millis(200),
            error_backoff: Duration::from_secs(1),
            verify_delay: Duration::from_millis(500),
        }
    }
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            managed_domains: config.managed_domains.clone(),
            default_ttl: config.default_ttl,
            ..Self::default()
        }
    }
}

pub struct ChallengeWorker {
    config: WorkerConfig,
    resolver: ZoneResolver,
    reconciler: RecordReconciler,
    probe: Option<PropagationProbe>,
    probe_delay: Duration,
}

impl ChallengeWorker {
    pub fn new(config: WorkerConfig, provider: Arc<dyn DNSProvider>) -> Self {
        let reconciler =
            RecordReconciler::new(provider.clone()).with_verify_delay(config.verify_delay);
        Self {
            config,
            resolver: ZoneResolver::new(provider),
            reconciler,
            probe: None,
            probe_delay: Duration::from_secs(2),
        }
    }

    /// Run the propagation diagnostics after every successful add.
    pub fn with_probe(mut self, probe: PropagationProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn should_handle(&self, domain: &str) -> bool {
        if self.config.managed_domains.is_empty() {
            return true;
        }
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return false;
        }
        self.config
            .managed_domains
            .iter()
            .any(|managed| domain == *managed || domain.ends_with(&format!(".{managed}")))
    }

    /// Runs the message loop alongside the session refresh cycle until shutdown.
    pub async fn serve<C>(
        &self,
        channel: &mut C,
        credentials: &CredentialManager,
        shutdown: Shutdown,
    ) where
        C: MessageChannel + ?Sized,
    {
        tokio::join!(
            self.run(channel, shutdown.clone()),
            credentials.run_refresh_cycle(shutdown),
        );
    }

    /// Receive, filter, reconcile and acknowledge until shutdown.
    pub async fn run<C>(&self, channel: &mut C, mut shutdown: Shutdown)
    where
        C: MessageChannel + ?Sized,
    {
        info!("Ready to process ACME challenge requests");
        while !shutdown.is_triggered() {
            let raw = match channel.receive().await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    idle(&mut shutdown, self.config.poll_interval).await;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to receive message");
                    idle(&mut shutdown, self.config.error_backoff).await;
                    continue;
                }
            };

            let Some(ack) = self.process(raw).await else {
                continue;
            };
            match serde_json::to_value(&ack) {
                Ok(payload) => match channel.produce(&payload).await {
                    Ok(()) if ack.is_ok() => info!(id = ?ack.id, "Sent acknowledgement"),
                    Ok(()) => warn!(id = ?ack.id, error = ?ack.error, "Sent error acknowledgement"),
                    Err(e) => error!(id = ?ack.id, error = %e, "Failed to send acknowledgement"),
                },
                Err(e) => error!(id = ?ack.id, error = %e, "Failed to encode acknowledgement"),
            }
        }
        info!("Challenge worker stopped");
    }

    /// Turns one raw message into at most one acknowledgement. `None` means the message
    /// belongs to another instance or could not be correlated.
    pub async fn process(&self, raw: Value) -> Option<ChallengeAck> {
        let payload = match serde_json::from_value::<RequestPayload>(raw.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                let salvaged = salvage(&raw);
                if salvaged.id.is_none() {
                    warn!(error = %e, "Dropping undecodable message without correlation id");
                    return None;
                }
                if !self.should_handle(salvaged.domain.as_deref().unwrap_or_default()) {
                    return None;
                }
                warn!(id = ?salvaged.id, error = %e, "Rejecting undecodable message");
                let err = Error::InvalidInput(format!("malformed request: {e}"));
                return Some(ChallengeAck::failed(&salvaged, &err));
            }
        };

        let domain = payload.domain.as_deref().unwrap_or_default();
        info!(
            id = ?payload.id,
            action = %payload.action_label(),
            name = payload.name.as_deref().unwrap_or_default(),
            domain,
            "Received challenge request"
        );
        if !self.should_handle(domain) {
            info!(domain, "Skipping request for domain not managed by this instance");
            return None;
        }

        let ack = match AssertUnwindSafe(self.handle(&payload)).catch_unwind().await {
            Ok(ack) => ack,
            Err(panic) => {
                let err = Error::Other(panic_message(panic.as_ref()));
                error!(id = ?payload.id, error = %err, "Request handler panicked");
                ChallengeAck::failed(&payload, &err)
            }
        };
        Some(ack)
    }

    pub async fn handle(&self, payload: &RequestPayload) -> ChallengeAck {
        let request = match payload.validate(self.config.default_ttl) {
            Ok(request) => request,
            Err(e) => {
                warn!(id = ?payload.id, error = %e, "Rejecting invalid request");
                return ChallengeAck::failed(payload, &e);
            }
        };

        match self.reconcile(&request).await {
            Ok((zone, record_id)) => ChallengeAck::ok(payload, &zone.id, record_id),
            Err(e) => {
                error!(id = ?request.id, name = %request.name, error = %e, "Challenge request failed");
                ChallengeAck::failed(payload, &e)
            }
        }
    }

    async fn reconcile(&self, request: &ChallengeRequest) -> Result<(Zone, Option<String>), Error> {
        let zone = self.resolver.resolve(&request.name).await?;

        match request.action {
            Action::Add => {
                info!(name = %request.name, zone = %zone.name, zone_id = %zone.id, "ADD challenge");
                let record_id = self
                    .reconciler
                    .add(&zone.id, &request.name, &request.value, request.ttl)
                    .await?;
                info!(
                    domain = %request.domain,
                    fqdn = %request.name,
                    zone = %zone.name,
                    record_id = %record_id,
                    ttl = request.ttl,
                    "ACME challenge record in place"
                );
                if let Some(probe) = &self.probe {
                    self.run_probe(probe, &zone, request).await;
                }
                Ok((zone, Some(record_id)))
            }
            Action::Remove => {
                info!(name = %request.name, zone = %zone.name, zone_id = %zone.id, "REMOVE challenge");
                let removed = self
                    .reconciler
                    .remove(&zone.id, &request.name, &request.value)
                    .await?;
                info!(
                    domain = %request.domain,
                    fqdn = %request.name,
                    removed = ?removed,
                    "ACME challenge record removed"
                );
                Ok((zone, removed))
            }
        }
    }

    async fn run_probe(&self, probe: &PropagationProbe, zone: &Zone, request: &ChallengeRequest) {
        info!(fqdn = %request.name, "Running DNS verification check");
        tokio::time::sleep(self.probe_delay).await;
        let provider_values = match self.reconciler.list(&zone.id, &request.name).await {
            Ok(records) => records.into_iter().map(|r| r.content).collect(),
            Err(e) => {
                warn!(error = %e, "DNS verification could not list provider records");
                Vec::new()
            }
        };
        probe
            .inspect(&request.name, &request.value, provider_values)
            .await
            .log();
    }
}

async fn idle(shutdown: &mut Shutdown, delay: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.wait() => {}
    }
}

/// Best-effort read of the string fields of a message that failed to decode.
fn salvage(raw: &Value) -> RequestPayload {
    let text = |key: &str| match raw.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    RequestPayload {
        id: text("id"),
        action: text("action"),
        domain: text("domain"),
        name: text("name"),
        value: text("value"),
        ttl: None,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {msg}")
    } else {
        "handler panicked".to_string()
    }
}

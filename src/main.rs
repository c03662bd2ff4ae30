use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

mod auth;
mod config;
mod core;
mod error;
mod logging;
mod propagation;
mod providers;
mod reconciler;
mod relay;
mod shutdown;
mod worker;
mod zone_resolver;

use crate::auth::credentials::CredentialManager;
use crate::auth::strongbox::StrongboxClient;
use crate::config::Config;
use crate::core::provider::DNSProvider;
use crate::error::Error;
use crate::propagation::PropagationProbe;
use crate::providers::cloudflare::error::map_error;
use crate::providers::cloudflare::{CloudflareConfig, CloudflareProvider};
use crate::relay::{HttpRelayChannel, RelayConfig};
use crate::shutdown::Shutdown;
use crate::worker::{ChallengeWorker, WorkerConfig};

async fn start(config: Config, shutdown: Shutdown) -> Result<JoinSet<()>, Error> {
    let identity = StrongboxClient::new(&config.api_host, config.api_ca_cert.as_deref())?;
    let credentials = CredentialManager::new(Arc::new(identity), &config.role_id, &config.secret_id)
        .with_refresh_margin(config.token_refresh_margin)
        .with_check_interval(config.token_check_interval);
    let session = credentials.login().await?;
    info!(
        valid_for_secs = session.expires_at().saturating_duration_since(Instant::now()).as_secs(),
        "Authenticated with identity plane"
    );

    let provider: Arc<dyn DNSProvider> = Arc::new(
        CloudflareProvider::new(CloudflareConfig {
            api_base: config.cf_api_base.clone(),
            api_token: config.cf_api_token.clone(),
            min_request_interval: Duration::from_millis(250),
        })
        .map_err(map_error)?,
    );
    info!(provider = provider.name(), api_base = %config.cf_api_base, "DNS provider ready");

    let mut channel = HttpRelayChannel::new(
        RelayConfig {
            api_host: config.api_host.clone(),
            topic_in: config.topic_in.clone(),
            topic_out: config.topic_out.clone(),
            consumer: config.consumer_name(),
        },
        credentials.handle(),
        config.api_ca_cert.as_deref(),
    )?;
    info!(
        topic_in = %config.topic_in,
        topic_out = %config.topic_out,
        consumer = %config.consumer_name(),
        "Relay channel ready"
    );

    if config.managed_domains.is_empty() {
        info!("Handling challenges for all domains");
    } else {
        let mut domains: Vec<&str> = config.managed_domains.iter().map(String::as_str).collect();
        domains.sort_unstable();
        info!(domains = %domains.join(", "), "Handling challenges for managed domains");
    }

    let mut worker = ChallengeWorker::new(WorkerConfig::from_config(&config), provider);
    if config.debug_dns_verification {
        info!("DNS propagation diagnostics enabled");
        worker = worker.with_probe(PropagationProbe::new());
    }

    let mut pool = JoinSet::new();
    pool.spawn(async move {
        worker.serve(&mut channel, &credentials, shutdown).await;
    });
    Ok(pool)
}

async fn wait_for_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Err(e.into());
        }
    };
    logging::init_logging(config.log_format);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting ACME DNS challenge relay");

    let (trigger, shutdown) = shutdown::channel();
    let mut pool = start(config, shutdown).await.inspect_err(|e| {
        error!(error = %e, "Startup failed");
    })?;

    match wait_for_signal().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
    trigger.trigger();

    while let Some(result) = pool.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Task terminated abnormally");
        }
    }
    info!("Shutdown complete");

    Ok(())
}

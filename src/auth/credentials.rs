use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::auth::session::{Session, SessionGrant, SessionHandle, SessionState};
use crate::error::Error;
use crate::shutdown::Shutdown;

/// Identity-plane contract: exchange a role identity for a token, or renew a token.
#[async_trait]
pub trait IdentityPlane: Send + Sync {
    async fn login(&self, role_id: &str, secret_id: &str) -> Result<SessionGrant, Error>;
    async fn refresh(&self, token: &str) -> Result<SessionGrant, Error>;
}

/// Sole owner and writer of the process-wide session.
pub struct CredentialManager {
    identity: Arc<dyn IdentityPlane>,
    role_id: String,
    secret_id: String,
    refresh_margin: Duration,
    check_interval: Duration,
    state: watch::Sender<SessionState>,
}

impl CredentialManager {
    pub fn new(identity: Arc<dyn IdentityPlane>, role_id: &str, secret_id: &str) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            identity,
            role_id: role_id.to_string(),
            secret_id: secret_id.to_string(),
            refresh_margin: Duration::from_secs(300),
            check_interval: Duration::from_secs(60),
            state,
        }
    }

    pub fn with_refresh_margin(mut self, refresh_margin: Duration) -> Self {
        self.refresh_margin = refresh_margin;
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.state.subscribe())
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        match &*self.state.borrow() {
            SessionState::Active(session) => Some(session.clone()),
            SessionState::Unauthenticated | SessionState::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Closed)
    }

    pub async fn login(&self) -> Result<Arc<Session>, Error> {
        info!(role_id = %self.role_id, "Logging in to identity plane");
        let grant = self.identity.login(&self.role_id, &self.secret_id).await?;
        info!(expires_in = grant.expires_in, "Session established");
        Ok(self.publish(Session::from_grant(grant, Instant::now())))
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Instant::now())
    }

    pub fn needs_refresh_at(&self, now: Instant) -> bool {
        match &*self.state.borrow() {
            SessionState::Unauthenticated => true,
            SessionState::Active(session) => session.needs_refresh_at(now, self.refresh_margin),
            SessionState::Closed => false,
        }
    }

    /// Renews via the refresh endpoint, falling back to a full login. On failure the
    /// previous session stays published.
    pub async fn refresh(&self) -> Result<Arc<Session>, Error> {
        let Some(current) = self.current() else {
            return self.login().await;
        };

        match self.identity.refresh(current.token()).await {
            Ok(grant) => {
                info!(expires_in = grant.expires_in, "Session token refreshed");
                Ok(self.publish(Session::from_grant(grant, Instant::now())))
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, falling back to login");
                self.login().await
            }
        }
    }

    /// Periodically refreshes the session until shutdown, then closes it.
    pub async fn run_refresh_cycle(&self, mut shutdown: Shutdown) {
        loop {
            if shutdown.is_triggered() || self.is_closed() {
                break;
            }
            if self.needs_refresh() {
                info!("Session needs refresh");
                if let Err(e) = self.refresh().await {
                    error!(error = %e, "Session refresh failed, retrying next cycle");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                _ = shutdown.wait() => break,
            }
        }
        self.close();
        info!("Credential refresh cycle stopped");
    }

    pub fn close(&self) {
        self.state.send_replace(SessionState::Closed);
    }

    fn publish(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.state.send_replace(SessionState::Active(session.clone()));
        session
    }
}

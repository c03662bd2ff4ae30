use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::Error;

/// Upper bound on the lifetime accepted from a grant.
const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Token material returned by the identity plane.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    #[serde(rename = "expires-in", alias = "expires_in")]
    pub expires_in: u64,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("token", &"<REDACTED>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// An authenticated session. Replaced wholesale on refresh, never mutated.
#[derive(Clone)]
pub struct Session {
    token: String,
    expires_at: Instant,
}

impl Session {
    pub fn new(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Lifetimes beyond thirty days are clamped.
    pub fn from_grant(grant: SessionGrant, now: Instant) -> Self {
        let lifetime = Duration::from_secs(grant.expires_in).min(MAX_SESSION_LIFETIME);
        Self::new(grant.token, now.checked_add(lifetime).unwrap_or(now))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// True once `now` is within `margin` of expiry.
    pub fn needs_refresh_at(&self, now: Instant, margin: Duration) -> bool {
        self.expires_at.saturating_duration_since(now) <= margin
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Unauthenticated,
    Active(Arc<Session>),
    Closed,
}

/// Read side of the managed session. Always yields a complete snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn new(rx: watch::Receiver<SessionState>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        match &*self.rx.borrow() {
            SessionState::Active(session) => Some(session.clone()),
            SessionState::Unauthenticated | SessionState::Closed => None,
        }
    }

    pub fn token(&self) -> Result<String, Error> {
        self.current()
            .map(|session| session.token().to_string())
            .ok_or_else(|| Error::CredentialError("no active session".to_string()))
    }
}

//! Session state machine
//!
//! `Unvalidated -> Validated -> Terminal`, one way. A [`Session`] moves
//! through these states under a single async mutex so no caller can observe
//! a half-finished transition. Enrollment code only ever receives a
//! [`ValidatedSession`], which cannot be built for a session that never
//! validated.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use super::platform::PlatformApi;

/// Account a validated session resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
    /// Entitlement flags reported by the platform (`is_instructor`, ...)
    pub flags: BTreeSet<String>,
}

/// How the session was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SessionAuth {
    /// Cookies reused from an installed browser
    BrowserCookies { browser: String, cookie_count: usize },
    /// Identifier/secret exchange; the secret itself is never kept
    Credentials { identifier: String },
}

/// Lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unvalidated,
    Validated(Identity),
    /// Rejected by the platform; a new session is needed
    Terminal { reason: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Unvalidated => "unvalidated",
            SessionState::Validated(_) => "validated",
            SessionState::Terminal { .. } => "terminal",
        }
    }
}

/// One authenticated client and its lifecycle
#[derive(Debug)]
pub struct Session {
    auth: SessionAuth,
    api: Arc<dyn PlatformApi>,
    state: Mutex<SessionState>,
    /// Slugs of courses the account owns
    enrolled: Mutex<HashSet<String>>,
    /// When the last outbound enrollment call returned
    last_call: Mutex<Option<Instant>>,
}

impl Session {
    /// New unvalidated session talking to the platform through `api`
    pub fn new(auth: SessionAuth, api: Arc<dyn PlatformApi>) -> Arc<Self> {
        Arc::new(Self {
            auth,
            api,
            state: Mutex::new(SessionState::Unvalidated),
            enrolled: Mutex::new(HashSet::new()),
            last_call: Mutex::new(None),
        })
    }

    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    pub fn api(&self) -> &Arc<dyn PlatformApi> {
        &self.api
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Lock the state for a transition (used by the manager's validate)
    pub(crate) async fn lock_state(&self) -> tokio::sync::MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Force the session into the terminal state
    pub async fn invalidate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.lock().await;
        if !matches!(*state, SessionState::Terminal { .. }) {
            warn!("Session invalidated: {}", reason);
            *state = SessionState::Terminal { reason };
        }
    }

    pub async fn is_enrolled(&self, slug: &str) -> bool {
        self.enrolled.lock().await.contains(slug)
    }

    pub async fn mark_enrolled(&self, slug: impl Into<String>) {
        self.enrolled.lock().await.insert(slug.into());
    }

    /// Add many owned courses; returns how many were new
    pub async fn extend_enrolled(&self, slugs: impl IntoIterator<Item = String>) -> usize {
        let mut enrolled = self.enrolled.lock().await;
        slugs.into_iter().filter(|s| enrolled.insert(s.clone())).count()
    }

    pub async fn enrolled_count(&self) -> usize {
        self.enrolled.lock().await.len()
    }

    /// End of the most recent enrollment call, across all executors
    pub async fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock().await
    }

    pub async fn stamp_call(&self) {
        *self.last_call.lock().await = Some(Instant::now());
    }
}

/// Proof that a session passed validation
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    session: Arc<Session>,
    identity: Identity,
}

impl ValidatedSession {
    /// Only the manager's validate builds these
    pub(crate) fn new(session: Arc<Session>, identity: Identity) -> Self {
        info!(
            "Authenticated as {} (user {})",
            identity.display_name, identity.user_id
        );
        Self { session, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn api(&self) -> &Arc<dyn PlatformApi> {
        self.session.api()
    }

    /// Still validated (not invalidated since)
    pub async fn is_active(&self) -> bool {
        matches!(self.session.state().await, SessionState::Validated(_))
    }

    pub async fn invalidate(&self, reason: impl Into<String>) {
        self.session.invalidate(reason).await;
    }

    pub async fn is_enrolled(&self, slug: &str) -> bool {
        self.session.is_enrolled(slug).await
    }

    pub async fn mark_enrolled(&self, slug: impl Into<String>) {
        self.session.mark_enrolled(slug).await;
    }

    pub async fn last_call(&self) -> Option<Instant> {
        self.session.last_call().await
    }

    pub async fn stamp_call(&self) {
        self.session.stamp_call().await;
    }
}

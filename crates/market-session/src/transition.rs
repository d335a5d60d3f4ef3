//! # Role Transitions
//!
//! Orchestrates a role switch: mark the transition, persist through the
//! [`RoleStateStore`], notify, then navigate to the new role's landing route.
//!
//! ```text
//! Idle ──▶ Transitioning ──┬─▶ Completed ──▶ (next transition)
//!                          └─▶ Aborted   ──▶ (next transition)
//! ```
//!
//! While a transition runs, a transient record sits in a session cache apart
//! from the role data. It is removed on every exit path. A record found at
//! the start of a transition was left by an interrupted run and is cleared.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_events::{EventBus, RoleEvent};
use market_rbac::{Role, RouteTable};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{LocalCache, MemoryCache};
use crate::error::{NavigationError, SessionError, SessionResult};
use crate::store::{RoleStateStore, EVENT_SOURCE};

/// Session cache key for the transient transition record.
pub const TRANSITION_RECORD_KEY: &str = "market_role_transition";

/// Navigation surface the coordinator drives after a switch.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Client-side navigation without a full reload.
    async fn navigate(&self, path: &str) -> Result<(), NavigationError>;

    /// Full-page redirect.
    async fn hard_redirect(&self, path: &str) -> Result<(), NavigationError>;

    /// Path currently shown.
    fn current_path(&self) -> String;
}

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    /// No transition has run
    Idle,
    /// A transition is running
    Transitioning,
    /// The last transition committed
    Completed,
    /// The last transition failed before committing
    Aborted,
}

impl TransitionPhase {
    /// Check whether a new transition may start from this phase.
    pub fn can_start(&self) -> bool {
        !matches!(self, TransitionPhase::Transitioning)
    }
}

/// Transient record of a running transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTransitionState {
    /// Always true while the record exists.
    pub transitioning: bool,
    /// Role being left.
    pub from_role: Role,
    /// Role being entered.
    pub to_role: Role,
    /// When the transition started.
    pub start_time: DateTime<Utc>,
    /// Path reported with the change notification.
    pub target_path: String,
    /// Set once persistence has committed.
    #[serde(default)]
    pub completed: bool,
}

/// Runs role switches for one principal.
pub struct RoleTransitionCoordinator {
    store: Arc<RoleStateStore>,
    events: Arc<dyn EventBus>,
    navigator: Arc<dyn Navigator>,
    routes: Arc<RouteTable>,
    session: Arc<dyn LocalCache>,
    phase: Mutex<TransitionPhase>,
}

impl std::fmt::Debug for RoleTransitionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleTransitionCoordinator")
            .field("store", &self.store)
            .field("phase", &self.phase())
            .finish()
    }
}

impl RoleTransitionCoordinator {
    /// Create a coordinator with an in-memory session cache.
    pub fn new(
        store: Arc<RoleStateStore>,
        events: Arc<dyn EventBus>,
        navigator: Arc<dyn Navigator>,
        routes: Arc<RouteTable>,
    ) -> Self {
        Self {
            store,
            events,
            navigator,
            routes,
            session: Arc::new(MemoryCache::new()),
            phase: Mutex::new(TransitionPhase::Idle),
        }
    }

    /// Use a specific session cache for the transient record.
    pub fn with_session_cache(mut self, session: Arc<dyn LocalCache>) -> Self {
        self.session = session;
        self
    }

    /// The role store.
    pub fn store(&self) -> &RoleStateStore {
        &self.store
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TransitionPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Transient record, if a transition is running or was interrupted.
    pub fn transition_state(&self) -> Option<RoleTransitionState> {
        let raw = self.session.get(TRANSITION_RECORD_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    /// Switch from `current_role` to `new_role`.
    ///
    /// Returns true when the switch committed, including when navigation had
    /// to fall back to a hard redirect. Switching to the current role is a
    /// successful no-op that emits nothing.
    #[instrument(skip(self), fields(from = %current_role, to = %new_role))]
    pub async fn transition_to_role(&self, current_role: Role, new_role: Role, preserve_path: bool) -> bool {
        if current_role == new_role {
            debug!("Already in requested role");
            return true;
        }

        let path = if preserve_path {
            self.navigator.current_path()
        } else {
            self.routes.landing_path(new_role).to_string()
        };

        let mut guard = match self.begin(current_role, new_role, &path) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Role transition refused");
                return false;
            }
        };

        if let Err(e) = self.persist(new_role).await {
            warn!(error = %e, code = e.error_code(), "Role transition aborted");
            return false;
        }

        guard.mark_committed();
        self.notify(current_role, new_role, &path).await;

        if !preserve_path {
            self.navigate(&path).await;
        }

        drop(guard);
        info!("Role transition completed");
        true
    }

    /// Switch using role identifiers. Unknown identifiers fail the switch.
    pub async fn transition_to_role_id(&self, current_role: &str, new_role: &str, preserve_path: bool) -> bool {
        match (Role::parse(current_role), Role::parse(new_role)) {
            (Some(current), Some(new)) => self.transition_to_role(current, new, preserve_path).await,
            _ => {
                warn!(from = %current_role, to = %new_role, "Role transition with unknown role");
                false
            }
        }
    }

    fn begin(&self, from: Role, to: Role, target_path: &str) -> SessionResult<TransitionGuard<'_>> {
        {
            let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if !phase.can_start() {
                return Err(SessionError::TransitionInProgress);
            }
            *phase = TransitionPhase::Transitioning;
        }

        // Guard first so the phase resets even if writing the record fails.
        let guard = TransitionGuard {
            session: self.session.as_ref(),
            phase: &self.phase,
            outcome: TransitionPhase::Aborted,
        };

        if let Some(stale) = self.transition_state() {
            warn!(
                from = %stale.from_role,
                to = %stale.to_role,
                started = %stale.start_time,
                "Clearing stale transition record"
            );
        }
        guard.clear_record();

        let record = RoleTransitionState {
            transitioning: true,
            from_role: from,
            to_role: to,
            start_time: Utc::now(),
            target_path: target_path.to_string(),
            completed: false,
        };
        guard.write_record(&record)?;

        Ok(guard)
    }

    async fn persist(&self, role: Role) -> SessionResult<()> {
        if self.store.has_durable_principal() {
            self.store.set_current_role_remote(role).await.map(|_| ())
        } else if self.store.set_current_role_in_local_context(role) {
            Ok(())
        } else {
            Err(SessionError::RoleNotAvailable(role.to_string()))
        }
    }

    async fn notify(&self, from: Role, to: Role, path: &str) {
        let changed = RoleEvent::Changed {
            from,
            to,
            timestamp: Utc::now(),
            path: path.to_string(),
        };

        let event = match changed.to_event(EVENT_SOURCE) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to encode role change");
                return;
            }
        };
        let event = match self.store.principal_id() {
            Some(id) => event.with_principal(id),
            None => event,
        };

        if let Err(e) = self.events.publish(event).await {
            warn!(error = %e, "Failed to publish role change");
        }
    }

    async fn navigate(&self, path: &str) {
        let Err(e) = self.navigator.navigate(path).await else {
            return;
        };

        warn!(path = %path, error = %e, "Navigation failed, falling back to hard redirect");
        if let Err(e) = self.navigator.hard_redirect(path).await {
            error!(path = %path, error = %e, "Hard redirect failed");
        }
    }
}

/// Clears the transient record and settles the phase when dropped.
struct TransitionGuard<'a> {
    session: &'a dyn LocalCache,
    phase: &'a Mutex<TransitionPhase>,
    outcome: TransitionPhase,
}

impl TransitionGuard<'_> {
    fn write_record(&self, record: &RoleTransitionState) -> SessionResult<()> {
        let raw = serde_json::to_string(record)?;
        self.session.set(TRANSITION_RECORD_KEY, &raw)?;
        Ok(())
    }

    /// Flag the running record as committed. Navigation may still follow.
    ///
    /// From here on the transition settles as completed, even if the caller
    /// is dropped before navigation finishes.
    fn mark_committed(&mut self) {
        self.outcome = TransitionPhase::Completed;
        let Some(mut record) = self
            .session
            .get(TRANSITION_RECORD_KEY)
            .and_then(|raw| serde_json::from_str::<RoleTransitionState>(&raw).ok())
        else {
            return;
        };
        record.completed = true;
        if let Err(e) = self.write_record(&record) {
            debug!(error = %e, "Failed to mark transition record committed");
        }
    }

    fn clear_record(&self) {
        if let Err(e) = self.session.remove(TRANSITION_RECORD_KEY) {
            warn!(error = %e, "Failed to clear transition record");
        }
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.clear_record();
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = self.outcome;
    }
}

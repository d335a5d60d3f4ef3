//! # Role State Store
//!
//! Principal-scoped record of the current and available roles, mirrored in
//! memory and persisted to a [`LocalCache`], reconciled against a
//! [`RoleAuthority`].
//!
//! ## Reconciliation
//!
//! The authority decides which roles are available. The local side decides
//! which of them is current, but only while a local selection is pending
//! (made with [`RoleStateStore::set_current_role_in_local_context`] and not
//! yet confirmed). On sync a pending selection that is still available is
//! pushed back to the authority; otherwise the authority's current role is
//! adopted.
//!
//! ```text
//! local  {publisher*, [viewer, publisher]}        * pending
//! remote {advertiser, [viewer, advertiser, publisher]}
//! sync → {publisher,  [viewer, advertiser, publisher]}, publisher pushed
//!
//! local  {publisher,  [viewer, publisher]}        confirmed
//! sync → {advertiser, [viewer, advertiser, publisher]}
//! ```
//!
//! Nothing here returns errors for bad input or unreachable collaborators.
//! Malformed records are replaced by the default and failures keep the prior
//! state.

use chrono::{DateTime, TimeZone, Utc};
use market_events::{EventBus, RoleEvent};
use market_rbac::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::authority::{HttpRoleAuthority, RemoteRoleData, RoleAuthority};
use crate::cache::{cache_from_config, LocalCache};
use crate::config::{SessionConfig, DEFAULT_CACHE_KEY};
use crate::error::{AuthorityError, SessionError, SessionResult};

/// Source name stamped on published events.
pub const EVENT_SOURCE: &str = "market-session";

/// A principal's role state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleData {
    /// Role the principal is acting as.
    pub current_role: Role,
    /// Roles assigned to the principal. Never empty; contains `current_role`.
    pub available_roles: Vec<Role>,
    /// Time of the last change.
    pub timestamp: DateTime<Utc>,
    /// Whether `current_role` is a local selection not yet confirmed remotely.
    pub pending_selection: bool,
}

impl Default for RoleData {
    fn default() -> Self {
        Self {
            current_role: Role::default(),
            available_roles: vec![Role::default()],
            timestamp: Utc::now(),
            pending_selection: false,
        }
    }
}

impl RoleData {
    /// Build role data from raw identifiers.
    ///
    /// Aliases are normalized and duplicates dropped. Unknown available roles
    /// are dropped; an empty list becomes `[default]`. An unknown current role,
    /// or one not in the list, falls back to the default role when available
    /// and to the first available role otherwise.
    pub fn from_identifiers<S: AsRef<str>>(
        current_role: &str,
        available_roles: &[S],
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut roles: Vec<Role> = Vec::with_capacity(available_roles.len());
        for raw in available_roles {
            match Role::parse(raw.as_ref()) {
                Some(role) if !roles.contains(&role) => roles.push(role),
                Some(_) => {}
                None => warn!(role = %raw.as_ref(), "Dropping unknown available role"),
            }
        }
        if roles.is_empty() {
            roles.push(Role::default());
        }

        let current = match Role::parse(current_role) {
            Some(role) if roles.contains(&role) => role,
            parsed => {
                let fallback = if roles.contains(&Role::default()) {
                    Role::default()
                } else {
                    roles.first().copied().unwrap_or_default()
                };
                warn!(
                    role = %current_role,
                    known = parsed.is_some(),
                    fallback = %fallback,
                    "Current role not usable, falling back"
                );
                fallback
            }
        };

        Self {
            current_role: current,
            available_roles: roles,
            timestamp,
            pending_selection: false,
        }
    }

    /// Validate and normalize a JSON role record.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRoleData`] when the record is not an object, or
    /// when `currentRole`, `availableRoles` or `timestamp` have the wrong type.
    pub fn from_json(value: &Value) -> SessionResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("expected an object"))?;

        let current = obj
            .get("currentRole")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("currentRole must be a string"))?;

        let available = obj
            .get("availableRoles")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("availableRoles must be an array"))?
            .iter()
            .map(|v| v.as_str().ok_or_else(|| invalid("availableRoles must hold strings")))
            .collect::<SessionResult<Vec<&str>>>()?;

        let timestamp = match obj.get("timestamp") {
            None | Some(Value::Null) => Utc::now(),
            Some(v) => v
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| invalid("timestamp must be epoch milliseconds"))?,
        };

        let pending = obj
            .get("pendingSelection")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut data = Self::from_identifiers(current, available.as_slice(), timestamp);
        data.pending_selection = pending && Role::parse(current) == Some(data.current_role);
        Ok(data)
    }

    /// Check whether a role is assigned.
    pub fn has_role(&self, role: Role) -> bool {
        self.available_roles.contains(&role)
    }

    fn to_stored(&self) -> StoredRoleData {
        StoredRoleData {
            current_role: self.current_role,
            available_roles: self.available_roles.clone(),
            timestamp: self.timestamp.timestamp_millis(),
            pending_selection: self.pending_selection,
        }
    }
}

fn invalid(reason: &str) -> SessionError {
    SessionError::InvalidRoleData(reason.to_string())
}

/// Cached record layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRoleData {
    current_role: Role,
    available_roles: Vec<Role>,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pending_selection: bool,
}

/// Role state for one principal.
///
/// # Example
///
/// ```
/// use market_rbac::Role;
/// use market_session::{MemoryCache, RoleStateStore};
/// use std::sync::Arc;
///
/// let store = RoleStateStore::new(Arc::new(MemoryCache::new()));
/// assert_eq!(store.current_role(), Role::Viewer);
///
/// store
///     .set_role_data(&serde_json::json!({
///         "currentRole": "viewer",
///         "availableRoles": ["viewer", "seller"],
///     }))
///     .unwrap();
///
/// assert!(store.set_current_role_in_local_context(Role::Publisher));
/// assert!(!store.set_current_role_in_local_context(Role::Admin));
/// assert_eq!(store.current_role(), Role::Publisher);
/// ```
pub struct RoleStateStore {
    cache: Arc<dyn LocalCache>,
    cache_key: String,
    authority: Option<Arc<dyn RoleAuthority>>,
    principal_id: Option<String>,
    events: Option<Arc<dyn EventBus>>,
    state: RwLock<Option<RoleData>>,
}

impl std::fmt::Debug for RoleStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleStateStore")
            .field("cache_key", &self.cache_key)
            .field("principal_id", &self.principal_id)
            .field("has_authority", &self.authority.is_some())
            .finish()
    }
}

impl RoleStateStore {
    /// Create a local-only store.
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self {
            cache,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            authority: None,
            principal_id: None,
            events: None,
            state: RwLock::new(None),
        }
    }

    /// Create a store with the configured cache and HTTP authority.
    pub fn from_config(config: &SessionConfig) -> SessionResult<Self> {
        let authority = HttpRoleAuthority::from_config(config)?;
        Ok(Self::new(cache_from_config(config))
            .with_cache_key(config.cache_key.clone())
            .with_authority(Arc::new(authority)))
    }

    /// Set the cache key.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    /// Attach the remote role authority.
    pub fn with_authority(mut self, authority: Arc<dyn RoleAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Bind a durable principal id.
    pub fn with_principal(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// Publish sync outcomes on a bus.
    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Durable principal id, if bound.
    pub fn principal_id(&self) -> Option<&str> {
        self.principal_id.as_deref()
    }

    /// Whether role switches can be recorded remotely.
    pub fn has_durable_principal(&self) -> bool {
        self.principal_id.is_some() && self.authority.is_some()
    }

    /// Current role state.
    ///
    /// Returns the in-memory record, then the cached one. A missing or
    /// malformed record is replaced by the default, which is persisted so later
    /// reads return the same record.
    pub fn get_role_data(&self) -> RoleData {
        if let Some(data) = self.read_state() {
            return data;
        }

        let Some(raw) = self.cache.get(&self.cache_key) else {
            debug!(key = %self.cache_key, "No role data, creating default");
            let data = RoleData::default();
            self.persist(data.clone());
            return data;
        };

        let decoded = serde_json::from_str::<Value>(&raw)
            .map_err(SessionError::from)
            .and_then(|value| RoleData::from_json(&value));

        match decoded {
            Ok(data) => {
                self.write_state(Some(data.clone()));
                data
            }
            Err(e) => {
                warn!(key = %self.cache_key, error = %e, "Replacing malformed role data with default");
                let data = RoleData::default();
                self.persist(data.clone());
                data
            }
        }
    }

    /// Role the principal is acting as.
    pub fn current_role(&self) -> Role {
        self.get_role_data().current_role
    }

    /// Roles assigned to the principal.
    pub fn available_roles(&self) -> Vec<Role> {
        self.get_role_data().available_roles
    }

    /// Validate, normalize and persist a role record.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidRoleData`] when the record has the wrong shape.
    /// State is left untouched in that case.
    pub fn set_role_data(&self, data: &Value) -> SessionResult<RoleData> {
        let data = RoleData::from_json(data)?;
        self.persist(data.clone());
        Ok(data)
    }

    /// Switch the current role locally.
    ///
    /// Succeeds only for an available role. The selection is marked pending
    /// until the authority confirms it.
    pub fn set_current_role_in_local_context(&self, role: Role) -> bool {
        let mut data = self.get_role_data();
        if !data.has_role(role) {
            warn!(role = %role, "Role not available, local switch refused");
            return false;
        }

        data.current_role = role;
        data.timestamp = Utc::now();
        data.pending_selection = true;
        self.persist(data);
        debug!(role = %role, "Current role set locally");
        true
    }

    /// Switch the current role from an identifier. Unknown ids are refused.
    pub fn select_role(&self, role: &str) -> bool {
        match Role::parse(role) {
            Some(role) => self.set_current_role_in_local_context(role),
            None => {
                warn!(role = %role, "Unknown role, local switch refused");
                false
            }
        }
    }

    /// Record a role switch with the authority, then locally.
    ///
    /// # Errors
    ///
    /// - [`SessionError::RoleNotAvailable`] if the role is not assigned
    /// - [`SessionError::Authority`] if no authority is attached or it fails
    #[instrument(skip(self), fields(role = %role))]
    pub async fn set_current_role_remote(&self, role: Role) -> SessionResult<RoleData> {
        let authority = self.authority.as_ref().ok_or_else(|| {
            AuthorityError::Unavailable("no role authority configured".to_string())
        })?;

        let mut data = self.get_role_data();
        if !data.has_role(role) {
            return Err(SessionError::RoleNotAvailable(role.to_string()));
        }

        authority.set_role(self.principal_id(), role).await?;

        data.current_role = role;
        data.timestamp = Utc::now();
        data.pending_selection = false;
        self.persist(data.clone());
        info!(role = %role, "Role switch recorded");
        Ok(data)
    }

    /// Reconcile with the authority.
    ///
    /// Never fails. Without an authority, when the authority cannot be
    /// reached, or when it reports no recognized role, the prior local state
    /// is returned unchanged.
    #[instrument(skip(self))]
    pub async fn sync_with_server(&self) -> RoleData {
        let local = self.get_role_data();

        let Some(authority) = self.authority.clone() else {
            debug!("No role authority, keeping local role data");
            return local;
        };

        let remote: RemoteRoleData = match authority.fetch_role_data(self.principal_id()).await {
            Ok(remote) => remote,
            Err(e) => return self.sync_failed(e.to_string(), local).await,
        };

        if !remote.available_roles.iter().any(|role| Role::parse(role).is_some()) {
            let reason = format!(
                "authority reported no recognized roles: {:?}",
                remote.available_roles
            );
            return self.sync_failed(reason, local).await;
        }

        let mut adopted = RoleData::from_identifiers(
            &remote.current_role,
            remote.available_roles.as_slice(),
            Utc::now(),
        );

        let keep_local = local.pending_selection
            && local.current_role != adopted.current_role
            && adopted.has_role(local.current_role);

        if keep_local {
            adopted.current_role = local.current_role;
            match authority.set_role(self.principal_id(), local.current_role).await {
                Ok(()) => {
                    debug!(role = %local.current_role, "Pushed local role selection to authority");
                }
                Err(e) => {
                    warn!(role = %local.current_role, error = %e, "Failed to push local role selection");
                    adopted.pending_selection = true;
                }
            }
        }

        self.persist(adopted.clone());
        self.publish(RoleEvent::Synced {
            current_role: adopted.current_role,
            available_roles: adopted.available_roles.clone(),
        })
        .await;

        adopted
    }

    /// Clear memory and cache.
    pub fn reset(&self) {
        self.write_state(None);
        if let Err(e) = self.cache.remove(&self.cache_key) {
            warn!(key = %self.cache_key, error = %e, "Failed to clear cached role data");
        }
    }

    async fn sync_failed(&self, reason: String, local: RoleData) -> RoleData {
        warn!(reason = %reason, "Role sync failed, keeping local role data");
        self.publish(RoleEvent::SyncFailed { reason }).await;
        local
    }

    /// Update memory, then the cache. Cache failures are logged.
    fn persist(&self, data: RoleData) {
        match serde_json::to_string(&data.to_stored()) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&self.cache_key, &raw) {
                    warn!(key = %self.cache_key, error = %e, "Failed to persist role data");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode role data"),
        }
        self.write_state(Some(data));
    }

    async fn publish(&self, event: RoleEvent) {
        let Some(bus) = &self.events else {
            return;
        };
        let event = match event.to_event(EVENT_SOURCE) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to encode role event");
                return;
            }
        };
        let event = match self.principal_id() {
            Some(id) => event.with_principal(id),
            None => event,
        };
        if let Err(e) = bus.publish(event).await {
            warn!(error = %e, "Failed to publish role event");
        }
    }

    fn read_state(&self) -> Option<RoleData> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write_state(&self, data: Option<RoleData>) {
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = data;
    }
}

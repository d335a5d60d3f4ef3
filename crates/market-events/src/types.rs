//! Event types for role state notifications
//!
//! This module defines the event envelope carried by the bus and the typed
//! role events published by the session layer.

use chrono::{DateTime, Utc};
use market_rbac::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::bus::{EventBusError, EventBusResult};

/// Topic for committed role switches.
pub const ROLE_CHANGED_TOPIC: &str = "role.changed";

/// Topic for successful reconciliations with the role authority.
pub const ROLE_SYNCED_TOPIC: &str = "role.synced";

/// Topic for failed reconciliations.
pub const ROLE_SYNC_FAILED_TOPIC: &str = "role.sync_failed";

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type, also the routing topic (e.g. "role.changed")
    pub event_type: String,

    /// Component that emitted the event
    pub source: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Principal the event concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,

    /// Correlation ID for tracing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `source` - The emitting component
    /// * `payload` - The event payload
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            principal_id: None,
            correlation_id: None,
            version: 1,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set principal context.
    pub fn with_principal(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the routing topic for this event.
    pub fn topic(&self) -> &str {
        &self.event_type
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Role state events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoleEvent {
    /// A role switch was committed
    Changed {
        from: Role,
        to: Role,
        timestamp: DateTime<Utc>,
        /// Path the principal was on when the switch committed
        path: String,
    },
    /// Local state was reconciled with the role authority
    Synced {
        #[serde(rename = "currentRole")]
        current_role: Role,
        #[serde(rename = "availableRoles")]
        available_roles: Vec<Role>,
    },
    /// Reconciliation failed; local state was kept
    SyncFailed { reason: String },
}

impl RoleEvent {
    /// Topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            RoleEvent::Changed { .. } => ROLE_CHANGED_TOPIC,
            RoleEvent::Synced { .. } => ROLE_SYNCED_TOPIC,
            RoleEvent::SyncFailed { .. } => ROLE_SYNC_FAILED_TOPIC,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self, source: &str) -> EventBusResult<Event> {
        let payload = serde_json::to_value(self)
            .map_err(|e| EventBusError::SerializationError(e.to_string()))?;
        Ok(Event::new(self.topic(), source, payload))
    }

    /// Recover a role event from a generic event.
    pub fn from_event(event: &Event) -> EventBusResult<Self> {
        event
            .parse_payload()
            .map_err(|e| EventBusError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let payload = serde_json::json!({"key": "value"});
        let event = Event::new("role.changed", "market-session", payload)
            .with_principal("user-42")
            .with_correlation_id("req-1");

        assert_eq!(event.event_type, "role.changed");
        assert_eq!(event.topic(), "role.changed");
        assert_eq!(event.source, "market-session");
        assert_eq!(event.principal_id.as_deref(), Some("user-42"));
    }

    #[test]
    fn test_role_changed_event() {
        let changed = RoleEvent::Changed {
            from: Role::Viewer,
            to: Role::Advertiser,
            timestamp: Utc::now(),
            path: "/dashboard".to_string(),
        };
        let event = changed.to_event("market-session").unwrap();
        assert_eq!(event.topic(), ROLE_CHANGED_TOPIC);
        assert_eq!(event.payload["type"], "changed");
        assert_eq!(event.payload["from"], "viewer");
        assert_eq!(event.payload["to"], "advertiser");

        assert_eq!(RoleEvent::from_event(&event).unwrap(), changed);
    }

    #[test]
    fn test_synced_payload_is_camel_case() {
        let synced = RoleEvent::Synced {
            current_role: Role::Publisher,
            available_roles: vec![Role::Viewer, Role::Publisher],
        };
        let event = synced.to_event("market-session").unwrap();
        assert_eq!(event.topic(), ROLE_SYNCED_TOPIC);
        assert_eq!(event.payload["currentRole"], "publisher");
        assert_eq!(event.payload["availableRoles"][0], "viewer");
    }

    #[test]
    fn test_from_event_rejects_foreign_payload() {
        let event = Event::new("role.changed", "elsewhere", serde_json::json!({"type": "unknown"}));
        assert!(matches!(
            RoleEvent::from_event(&event),
            Err(EventBusError::SerializationError(_))
        ));
    }
}

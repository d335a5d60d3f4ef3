//! # Market Events
//!
//! Notification bus for role state changes in the marketplace dashboard.
//!
//! ## Overview
//!
//! The market-events crate handles:
//! - **Event Envelope**: Routing and tracing metadata around a JSON payload
//! - **Role Events**: Typed role switch and sync notifications
//! - **Event Bus**: Publish/subscribe messaging with wildcard topics
//! - **Event Handlers**: Async event processing, including closure handlers
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use market_events::{EventBus, MemoryEventBus, RoleEvent};
//! use market_rbac::Role;
//!
//! async fn publish_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     let changed = RoleEvent::Changed {
//!         from: Role::Viewer,
//!         to: Role::Publisher,
//!         timestamp: Utc::now(),
//!         path: "/dashboard".to_string(),
//!     };
//!
//!     bus.publish(changed.to_event("dashboard").unwrap()).await.unwrap();
//! }
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust,no_run
//! use market_events::{EventBus, MemoryEventBus, RoleEvent};
//!
//! async fn subscribe_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     // Every role event
//!     let mut sub = bus.subscribe("role.*").await.unwrap();
//!
//!     while let Ok(event) = sub.recv().await {
//!         if let Ok(RoleEvent::Changed { from, to, .. }) = RoleEvent::from_event(&event) {
//!             println!("{from} -> {to}");
//!         }
//!     }
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are the event type:
//! - `role.changed` - A committed role switch
//! - `role.synced` - Local state reconciled with the role authority
//! - `role.sync_failed` - Reconciliation failed, local state kept
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{
    topic_matches, EventBus, EventBusError, EventBusResult, EventHandler,
    FnEventHandler, MemoryEventBus, Subscription,
};
pub use types::{Event, RoleEvent, ROLE_CHANGED_TOPIC, ROLE_SYNCED_TOPIC, ROLE_SYNC_FAILED_TOPIC};

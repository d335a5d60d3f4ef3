//! # Market Session
//!
//! Role state for a marketplace dashboard principal, and role switching.
//!
//! ## Overview
//!
//! The market-session crate handles:
//! - **Role State**: Current and available roles, mirrored in memory and a local cache
//! - **Authority Sync**: Reconciliation with the remote role authority over HTTP
//! - **Role Transitions**: Persist, notify and navigate when a principal switches roles
//! - **Configuration**: Environment-driven endpoint and cache settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use market_events::MemoryEventBus;
//! use market_rbac::{Role, RouteTable};
//! use market_session::{
//!     HttpRoleAuthority, NavigationError, Navigator, RoleStateStore, RoleTransitionCoordinator,
//!     SessionConfig,
//! };
//!
//! struct Browser;
//!
//! #[async_trait::async_trait]
//! impl Navigator for Browser {
//!     async fn navigate(&self, _path: &str) -> Result<(), NavigationError> { Ok(()) }
//!     async fn hard_redirect(&self, _path: &str) -> Result<(), NavigationError> { Ok(()) }
//!     fn current_path(&self) -> String { "/dashboard".to_string() }
//! }
//!
//! async fn switch() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::from_env();
//!     let bus = Arc::new(MemoryEventBus::new());
//!
//!     let store = RoleStateStore::from_config(&config)?
//!         .with_authority(Arc::new(HttpRoleAuthority::from_config(&config)?))
//!         .with_principal("principal-42")
//!         .with_events(bus.clone());
//!     store.sync_with_server().await;
//!
//!     let coordinator = RoleTransitionCoordinator::new(
//!         Arc::new(store),
//!         bus,
//!         Arc::new(Browser),
//!         Arc::new(RouteTable::marketplace()?),
//!     );
//!     coordinator.transition_to_role(Role::Viewer, Role::Publisher, false).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `ROLE_AUTHORITY_URL`: Role authority base URL
//! - `ROLE_AUTHORITY_API_KEY`: Bearer token for the authority
//! - `ROLE_AUTHORITY_TIMEOUT_SECS`: Request timeout
//! - `ROLE_AUTHORITY_MAX_RETRIES`: Read attempts
//! - `ROLE_CACHE_DIR`: Directory for the file cache (memory cache when unset)
//! - `ROLE_CACHE_KEY`: Cache key for role data

pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod retry;
pub mod store;
pub mod transition;

pub use authority::{HttpRoleAuthority, RemoteRoleData, RoleAuthority, PRINCIPAL_HEADER};
pub use cache::{cache_from_config, FileCache, LocalCache, MemoryCache};
pub use config::{AuthorityEndpoint, SessionConfig, DEFAULT_CACHE_KEY};
pub use error::{AuthorityError, CacheError, NavigationError, SessionError, SessionResult};
pub use retry::{retry_if, RetryPolicy};
pub use store::{RoleData, RoleStateStore, EVENT_SOURCE};
pub use transition::{
    Navigator, RoleTransitionCoordinator, RoleTransitionState, TransitionPhase,
    TRANSITION_RECORD_KEY,
};

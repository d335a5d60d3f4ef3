//! # Market RBAC
//!
//! Permission-based access control for the marketplace dashboard.
//!
//! ## Overview
//!
//! The market-rbac crate handles:
//! - **Roles**: The closed set of principal roles and legacy alias normalization
//! - **Permissions**: Guarded actions with directly allowed roles and an optional parent
//! - **Registry**: A validated, acyclic permission catalog in topological order
//! - **Capabilities**: Per-role resolution of every permission, with inheritance chains
//! - **Routes**: Closed-world gating of dashboard paths
//!
//! Everything here is pure and synchronous. Unknown roles, permissions and
//! paths resolve to denial rather than errors; only catalog construction fails.
//!
//! ## Inheritance
//!
//! ```text
//! campaign.manage          (no direct roles)
//!   └─ campaign.edit       advertiser
//!        └─ campaign.view  stakeholder
//!
//! advertiser holds campaign.view, inherited from [campaign.edit]
//! ```
//!
//! A parent is the broader permission. Holding it implies every descendant.
//!
//! ## Usage
//!
//! ```rust
//! use market_rbac::{CapabilityResolver, Role, RouteAccessMatcher};
//!
//! let resolver = CapabilityResolver::marketplace().unwrap();
//! assert!(resolver.check_permission("campaign.view", "advertiser", None));
//! assert!(resolver.check_role_permission("platform.settings", Role::Admin, None));
//!
//! let routes = RouteAccessMatcher::marketplace().unwrap();
//! assert!(routes.check_route_access("/dashboard/publisher/inventory", "publisher"));
//! assert!(!routes.check_route_access("/dashboard/publisher/inventory", "advertiser"));
//! ```

pub mod capabilities;
pub mod catalog;
pub mod error;
pub mod permissions;
pub mod registry;
pub mod roles;
pub mod routes;

pub use capabilities::{Capability, CapabilityMap, CapabilityResolver, CheckContext, TestMode};
pub use catalog::marketplace_permissions;
pub use error::{CatalogError, CatalogResult};
pub use permissions::{Permission, PermissionCategory};
pub use registry::PermissionRegistry;
pub use roles::{normalize_role_id, Role, UnknownRole};
pub use routes::{
    default_landing_path, normalize_path, RouteAccessMatcher, RouteRule, RouteTable,
    RouteTableBuilder,
};

//! # Permissions
//!
//! Permission definitions for the marketplace catalog. A permission is a named
//! guarded action with the roles directly entitled to it and an optional parent
//! permission it inherits from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::roles::Role;

/// Functional area a permission belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Dashboard shell and navigation.
    Dashboard,
    /// Ad campaigns.
    Campaign,
    /// Publisher ad inventory.
    Inventory,
    /// Wallet balances, deposits and withdrawals.
    Wallet,
    /// Reporting and analytics.
    Analytics,
    /// User and role management.
    Users,
    /// Platform-wide settings and audit.
    Platform,
}

impl PermissionCategory {
    /// Get the string representation of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Campaign => "campaign",
            Self::Inventory => "inventory",
            Self::Wallet => "wallet",
            Self::Analytics => "analytics",
            Self::Users => "users",
            Self::Platform => "platform",
        }
    }

    /// Parse category from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dashboard" => Some(Self::Dashboard),
            "campaign" | "campaigns" => Some(Self::Campaign),
            "inventory" => Some(Self::Inventory),
            "wallet" | "wallets" => Some(Self::Wallet),
            "analytics" | "reports" => Some(Self::Analytics),
            "users" | "user" => Some(Self::Users),
            "platform" | "system" => Some(Self::Platform),
            _ => None,
        }
    }
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission declared in the catalog.
///
/// A role holds a permission when it is listed in [`allowed_roles`](Self::allowed_roles)
/// or when it holds the permission's parent (transitively). Parents are the
/// broader permissions: holding `campaign.manage` implies `campaign.edit`.
///
/// # Example
///
/// ```
/// use market_rbac::{Permission, PermissionCategory, Role};
///
/// let perm = Permission::new("campaign.edit", PermissionCategory::Campaign, "Edit campaigns")
///     .allow(Role::Advertiser)
///     .with_parent("campaign.manage");
///
/// assert!(perm.is_directly_allowed(Role::Advertiser));
/// assert!(!perm.is_directly_allowed(Role::Publisher));
/// assert_eq!(perm.parent.as_deref(), Some("campaign.manage"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// Unique identifier, e.g. `campaign.create`.
    pub id: String,
    /// Functional area.
    pub category: PermissionCategory,
    /// Human-readable description.
    pub description: String,
    /// Roles directly entitled to this permission.
    #[serde(default)]
    pub allowed_roles: BTreeSet<Role>,
    /// Whether checks against this permission are logged as sensitive.
    #[serde(default)]
    pub is_sensitive: bool,
    /// Parent permission this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Permission {
    /// Create a permission with no allowed roles and no parent.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique permission identifier
    /// * `category` - Functional area
    /// * `description` - Human-readable description
    pub fn new(
        id: impl Into<String>,
        category: PermissionCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            allowed_roles: BTreeSet::new(),
            is_sensitive: false,
            parent: None,
        }
    }

    /// Directly allow a role.
    pub fn allow(mut self, role: Role) -> Self {
        self.allowed_roles.insert(role);
        self
    }

    /// Directly allow several roles.
    pub fn allow_all<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.allowed_roles.extend(roles);
        self
    }

    /// Set the parent permission.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark the permission as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.is_sensitive = true;
        self
    }

    /// Check whether a role is listed directly (ignoring inheritance).
    pub fn is_directly_allowed(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }

    /// Check if this permission has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

//! # Marketplace Catalog
//!
//! The statically declared permission set for the marketplace dashboard.
//!
//! Parents are broader permissions than their children. A few children are
//! declared ahead of their parents; resolution never depends on declaration
//! order.
//!
//! ```text
//! campaign.manage ─┬─ campaign.edit ── campaign.view
//!                  ├─ campaign.create
//!                  └─ campaign.approve
//! wallet.manage ───┬─ wallet.withdraw ── wallet.view ── wallet.history
//!                  └─ wallet.deposit
//! analytics.manage ── analytics.export ── analytics.view ── analytics.summary
//! ```

use crate::permissions::{Permission, PermissionCategory};
use crate::roles::Role;

/// Roles that hold a non-admin marketplace seat.
const MARKET_ROLES: [Role; 4] = [Role::Viewer, Role::Advertiser, Role::Publisher, Role::Stakeholder];

/// Build the marketplace permission list in declaration order.
pub fn marketplace_permissions() -> Vec<Permission> {
    use PermissionCategory::*;

    vec![
        // Dashboard
        Permission::new("dashboard.view", Dashboard, "View the dashboard shell")
            .allow_all(MARKET_ROLES),
        Permission::new("dashboard.switch_role", Dashboard, "Switch between assigned roles")
            .allow_all(MARKET_ROLES),
        // Campaigns
        Permission::new("campaign.view", Campaign, "View campaigns and their status")
            .allow(Role::Stakeholder)
            .with_parent("campaign.edit"),
        Permission::new("campaign.edit", Campaign, "Edit campaign creatives and budgets")
            .allow(Role::Advertiser)
            .with_parent("campaign.manage"),
        Permission::new("campaign.create", Campaign, "Create new campaigns")
            .allow(Role::Advertiser)
            .with_parent("campaign.manage"),
        Permission::new("campaign.approve", Campaign, "Approve campaigns for delivery")
            .with_parent("campaign.manage")
            .sensitive(),
        Permission::new("campaign.manage", Campaign, "Manage every campaign on the marketplace"),
        // Inventory
        Permission::new("inventory.manage", Inventory, "Manage ad slots and placements")
            .allow(Role::Publisher),
        Permission::new("inventory.view", Inventory, "View listed ad inventory")
            .allow(Role::Stakeholder)
            .with_parent("inventory.manage"),
        Permission::new("inventory.pricing", Inventory, "Set floor prices for ad slots")
            .with_parent("inventory.manage"),
        // Wallet
        Permission::new("wallet.manage", Wallet, "Manage any wallet").sensitive(),
        Permission::new("wallet.withdraw", Wallet, "Withdraw publisher earnings")
            .allow(Role::Publisher)
            .with_parent("wallet.manage")
            .sensitive(),
        Permission::new("wallet.deposit", Wallet, "Deposit funds for campaigns")
            .allow(Role::Advertiser)
            .with_parent("wallet.manage")
            .sensitive(),
        Permission::new("wallet.view", Wallet, "View wallet balance")
            .allow(Role::Advertiser)
            .with_parent("wallet.withdraw"),
        Permission::new("wallet.history", Wallet, "View wallet transaction history")
            .with_parent("wallet.view"),
        // Analytics
        Permission::new("analytics.summary", Analytics, "View headline metrics")
            .allow(Role::Viewer)
            .with_parent("analytics.view"),
        Permission::new("analytics.view", Analytics, "View detailed reports")
            .allow_all([Role::Advertiser, Role::Publisher])
            .with_parent("analytics.export"),
        Permission::new("analytics.export", Analytics, "Export reports")
            .allow(Role::Stakeholder)
            .with_parent("analytics.manage"),
        Permission::new("analytics.manage", Analytics, "Configure reporting pipelines"),
        // Users
        Permission::new("users.manage", Users, "Manage marketplace users").sensitive(),
        Permission::new("users.view", Users, "View the user directory")
            .allow(Role::Stakeholder)
            .with_parent("users.manage"),
        Permission::new("users.assign_roles", Users, "Grant and revoke user roles")
            .with_parent("users.manage")
            .sensitive(),
        // Platform
        Permission::new("platform.settings", Platform, "Change platform settings").sensitive(),
        Permission::new("platform.audit_log", Platform, "Read the audit log")
            .allow(Role::Stakeholder)
            .with_parent("platform.settings")
            .sensitive(),
    ]
}

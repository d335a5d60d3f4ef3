//! Marketplace roles
//!
//! This module defines the closed set of principal roles for the marketplace
//! dashboard, the single normalization point for legacy role identifiers, and
//! the legacy numeric hierarchy kept for elevation checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A principal role in the marketplace.
///
/// Entitlements are decided by membership in a permission's or route's role
/// list. The numeric [`Role::level`] is a legacy compatibility value used only
/// for elevation checks; it never grants anything on its own.
///
/// # Roles
///
/// - **Viewer**: Read-only dashboard access (the default role)
/// - **Advertiser**: Runs ad campaigns and funds a wallet
/// - **Publisher**: Sells ad inventory and withdraws earnings
/// - **Stakeholder**: Reporting and audit visibility across the marketplace
/// - **Admin**: Top tier, passes every check
///
/// # Examples
///
/// ```
/// use market_rbac::Role;
///
/// assert_eq!(Role::parse("ADVERTISER"), Some(Role::Advertiser));
/// assert_eq!(Role::parse("super-admin"), Some(Role::Admin));
/// assert!(Role::Admin.is_top_tier());
/// assert!(Role::Stakeholder.outranks(Role::Publisher));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Role {
    /// Read-only dashboard access
    Viewer,

    /// Creates and funds ad campaigns
    Advertiser,

    /// Sells ad inventory
    Publisher,

    /// Reporting and audit visibility
    Stakeholder,

    /// Platform administrator
    Admin,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::Advertiser,
        Role::Publisher,
        Role::Stakeholder,
        Role::Admin,
    ];

    /// Parse a role identifier, resolving legacy aliases.
    ///
    /// # Arguments
    ///
    /// * `s` - Role identifier (case-insensitive, `-` and spaces allowed)
    ///
    /// # Returns
    ///
    /// `Some(Role)` if the identifier names a known role, `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use market_rbac::Role;
    ///
    /// assert_eq!(Role::parse("publisher"), Some(Role::Publisher));
    /// assert_eq!(Role::parse(" Media Owner "), Some(Role::Publisher));
    /// assert_eq!(Role::parse("investor"), Some(Role::Stakeholder));
    /// assert_eq!(Role::parse("janitor"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_role_id(s).as_str() {
            "viewer" => Some(Self::Viewer),
            "advertiser" => Some(Self::Advertiser),
            "publisher" => Some(Self::Publisher),
            "stakeholder" => Some(Self::Stakeholder),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Canonical string identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use market_rbac::Role;
    ///
    /// assert_eq!(Role::Stakeholder.as_str(), "stakeholder");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Advertiser => "advertiser",
            Self::Publisher => "publisher",
            Self::Stakeholder => "stakeholder",
            Self::Admin => "admin",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Advertiser => "Advertiser",
            Self::Publisher => "Publisher",
            Self::Stakeholder => "Stakeholder",
            Self::Admin => "Administrator",
        }
    }

    /// Legacy numeric hierarchy level.
    ///
    /// Advertiser and publisher share a level; neither outranks the other.
    pub fn level(&self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::Advertiser | Self::Publisher => 2,
            Self::Stakeholder => 3,
            Self::Admin => 4,
        }
    }

    /// Check whether this role sits strictly above `other` in the legacy hierarchy.
    pub fn outranks(&self, other: Role) -> bool {
        self.level() > other.level()
    }

    /// Check whether moving from `self` to `target` is an elevation.
    pub fn is_elevation_to(&self, target: Role) -> bool {
        target.outranks(*self)
    }

    /// Check if this is the top-tier role that bypasses every check.
    pub fn is_top_tier(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value).ok_or(UnknownRole(value))
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A role identifier that does not name any known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Normalize a role identifier to its canonical spelling.
///
/// This is the only place legacy aliases are resolved. Every boundary that
/// accepts a role string (deserialization, comparison, persistence) goes
/// through here. Unknown identifiers come back trimmed and lowercased but
/// otherwise unchanged, so they still fail [`Role::parse`].
///
/// # Examples
///
/// ```
/// use market_rbac::roles::normalize_role_id;
///
/// assert_eq!(normalize_role_id("Super-Admin"), "admin");
/// assert_eq!(normalize_role_id("  Pub "), "publisher");
/// assert_eq!(normalize_role_id("Unknown Thing"), "unknown_thing");
/// ```
pub fn normalize_role_id(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();

    let canonical = match cleaned.as_str() {
        "user" | "guest" | "basic" | "read_only" | "readonly" => "viewer",
        "adv" | "advertizer" | "buyer" | "brand" => "advertiser",
        "pub" | "seller" | "creator" | "media_owner" => "publisher",
        "investor" | "partner" | "shareholder" => "stakeholder",
        "administrator" | "super_admin" | "superadmin" | "root" => "admin",
        _ => return cleaned,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("viewer"), Some(Role::Viewer));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("advertizer"), Some(Role::Advertiser));
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_round_trip_through_as_str() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_legacy_levels() {
        assert!(Role::Admin.outranks(Role::Stakeholder));
        assert!(Role::Stakeholder.outranks(Role::Advertiser));
        assert!(!Role::Advertiser.outranks(Role::Publisher));
        assert!(!Role::Publisher.outranks(Role::Advertiser));
        assert!(Role::Viewer.is_elevation_to(Role::Publisher));
        assert!(!Role::Admin.is_elevation_to(Role::Viewer));
    }

    #[test]
    fn test_only_admin_is_top_tier() {
        let top: Vec<Role> = Role::ALL.into_iter().filter(Role::is_top_tier).collect();
        assert_eq!(top, vec![Role::Admin]);
    }

    #[test]
    fn test_deserialize_normalizes_aliases() {
        let role: Role = serde_json::from_str("\"Media-Owner\"").unwrap();
        assert_eq!(role, Role::Publisher);

        let roles: Vec<Role> = serde_json::from_str(r#"["user", "root"]"#).unwrap();
        assert_eq!(roles, vec![Role::Viewer, Role::Admin]);

        assert!(serde_json::from_str::<Role>("\"janitor\"").is_err());
    }

    #[test]
    fn test_serialize_is_canonical() {
        assert_eq!(serde_json::to_string(&Role::Stakeholder).unwrap(), "\"stakeholder\"");
    }

    #[test]
    fn test_default_role() {
        assert_eq!(Role::default(), Role::Viewer);
    }
}

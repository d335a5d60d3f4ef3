//! # Route Access
//!
//! Closed-world gating of hierarchical dashboard paths.
//!
//! A [`RouteTable`] holds three kinds of entries:
//! - public paths, reachable by anyone on exact match
//! - grant rules, a path prefix and the roles allowed under it
//! - restricted rules, a path prefix and the *only* roles allowed under it
//!
//! [`RouteAccessMatcher`] evaluates a path against the table. Prefixes match on
//! whole segments: `/dashboard/admin` covers `/dashboard/admin/users` but not
//! `/dashboard/administrator`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::roles::Role;

/// Path-prefix rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Normalized path prefix.
    pub prefix: String,
    /// Roles named by the rule.
    pub roles: BTreeSet<Role>,
}

impl RouteRule {
    /// Check whether the rule names a role.
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Validated route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    public: BTreeSet<String>,
    grants: BTreeMap<String, RouteRule>,
    restricted: BTreeMap<String, RouteRule>,
    landing: BTreeMap<Role, String>,
}

impl RouteTable {
    /// Start building a table.
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// The marketplace dashboard table.
    pub fn marketplace() -> CatalogResult<Self> {
        use Role::*;

        Self::builder()
            .public("/")
            .public("/login")
            .public("/signup")
            .public("/about")
            .public("/unauthorized")
            .grant("/dashboard", [Viewer, Advertiser, Publisher, Stakeholder])
            .grant("/dashboard/advertiser", [Advertiser])
            .grant("/dashboard/publisher", [Publisher])
            .grant("/dashboard/stakeholder", [Stakeholder])
            .grant("/dashboard/wallet", [Advertiser, Publisher])
            .grant("/dashboard/analytics", [Advertiser, Publisher, Stakeholder])
            .grant("/dashboard/settings", Role::ALL)
            .grant("/dashboard/role-selection", Role::ALL)
            .grant("/dashboard/admin", [Admin])
            .restrict("/dashboard/admin", [Admin])
            .restrict("/dashboard/advertiser", [Advertiser])
            .restrict("/dashboard/publisher", [Publisher])
            .restrict("/dashboard/stakeholder", [Stakeholder])
            .restrict("/dashboard/wallet", [Advertiser, Publisher])
            .restrict("/dashboard/analytics", [Advertiser, Publisher, Stakeholder])
            .restrict("/dashboard/wallet/withdraw", [Publisher])
            .build()
    }

    /// Check whether a normalized path is public.
    pub fn is_public(&self, path: &str) -> bool {
        self.public.contains(path)
    }

    /// Grant rule declared exactly at `prefix`.
    pub fn grant_rule(&self, prefix: &str) -> Option<&RouteRule> {
        self.grants.get(prefix)
    }

    /// Restricted rule declared exactly at `prefix`.
    pub fn restricted_rule(&self, prefix: &str) -> Option<&RouteRule> {
        self.restricted.get(prefix)
    }

    /// Landing path for a role, falling back to [`default_landing_path`].
    pub fn landing_path(&self, role: Role) -> &str {
        self.landing
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| default_landing_path(role))
    }
}

/// Builder for [`RouteTable`].
///
/// Prefixes are normalized on insert; [`build`](Self::build) rejects any that
/// were not absolute.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
    invalid: Option<String>,
}

impl RouteTableBuilder {
    /// Add a public path.
    pub fn public(mut self, path: &str) -> Self {
        if let Some(path) = self.checked(path) {
            self.table.public.insert(path);
        }
        self
    }

    /// Add a grant rule. Repeated prefixes merge their roles.
    pub fn grant<I>(mut self, prefix: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        if let Some(prefix) = self.checked(prefix) {
            insert_rule(&mut self.table.grants, prefix, roles);
        }
        self
    }

    /// Add a restricted rule. Repeated prefixes merge their roles.
    pub fn restrict<I>(mut self, prefix: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        if let Some(prefix) = self.checked(prefix) {
            insert_rule(&mut self.table.restricted, prefix, roles);
        }
        self
    }

    /// Override the landing path for a role.
    pub fn landing(mut self, role: Role, path: &str) -> Self {
        if let Some(path) = self.checked(path) {
            self.table.landing.insert(role, path);
        }
        self
    }

    /// Finish the table.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidRoutePrefix`] for the first prefix that did not
    /// start with `/`.
    pub fn build(self) -> CatalogResult<RouteTable> {
        match self.invalid {
            Some(prefix) => Err(CatalogError::InvalidRoutePrefix(prefix)),
            None => Ok(self.table),
        }
    }

    fn checked(&mut self, prefix: &str) -> Option<String> {
        if prefix.starts_with('/') {
            Some(normalize_path(prefix))
        } else {
            if self.invalid.is_none() {
                self.invalid = Some(prefix.to_string());
            }
            None
        }
    }
}

fn insert_rule<I>(rules: &mut BTreeMap<String, RouteRule>, prefix: String, roles: I)
where
    I: IntoIterator<Item = Role>,
{
    rules
        .entry(prefix.clone())
        .or_insert_with(|| RouteRule {
            prefix,
            roles: BTreeSet::new(),
        })
        .roles
        .extend(roles);
}

/// Default landing route for a role.
pub fn default_landing_path(role: Role) -> &'static str {
    match role {
        Role::Viewer => "/dashboard",
        Role::Advertiser => "/dashboard/advertiser",
        Role::Publisher => "/dashboard/publisher",
        Role::Stakeholder => "/dashboard/stakeholder",
        Role::Admin => "/dashboard/admin",
    }
}

/// Normalize a request path.
///
/// Drops the query string and fragment, collapses repeated slashes, and strips
/// the trailing slash. An empty path becomes `/`.
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let segments: Vec<&str> = raw[..end].split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Accumulated prefixes of a normalized path, shortest first.
///
/// `/a/b` yields `/`, `/a`, `/a/b`.
fn prefixes(path: &str) -> Vec<&str> {
    let mut out = vec!["/"];
    for (end, _) in path.match_indices('/').skip(1) {
        out.push(&path[..end]);
    }
    if path.len() > 1 {
        out.push(path);
    }
    out
}

/// Decides whether a role may reach a path.
///
/// Evaluation order:
/// 1. Normalize the path
/// 2. Top-tier role: allowed
/// 3. Public path: allowed
/// 4. Any restricted prefix that does not name the role: denied
/// 5. Grant rule at the exact path decides
/// 6. Walk prefixes shortest to longest; a grant naming the role allows, a
///    restricted rule not naming it denies
/// 7. Otherwise denied
///
/// Because restricted rules are applied before any grant, a deny at a shorter
/// or equal prefix always beats a grant at a longer one.
///
/// # Example
///
/// ```
/// use market_rbac::RouteAccessMatcher;
///
/// let matcher = RouteAccessMatcher::marketplace().unwrap();
/// assert!(matcher.check_route_access("/dashboard/admin", "admin"));
/// assert!(!matcher.check_route_access("/dashboard/admin", "viewer"));
/// assert!(matcher.check_route_access("/dashboard/advertiser/campaigns/new", "advertiser"));
/// assert!(!matcher.check_route_access("/dashboard/advertiser/campaigns/new", "publisher"));
/// ```
#[derive(Debug, Clone)]
pub struct RouteAccessMatcher {
    table: Arc<RouteTable>,
}

impl RouteAccessMatcher {
    /// Create a matcher over a table.
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Create a matcher over the marketplace table.
    pub fn marketplace() -> CatalogResult<Self> {
        Ok(Self::new(Arc::new(RouteTable::marketplace()?)))
    }

    /// The underlying table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Check route access for a role identifier. Unknown roles are denied.
    pub fn check_route_access(&self, path: &str, role: &str) -> bool {
        match Role::parse(role) {
            Some(role) => self.check_role_route_access(path, role),
            None => {
                warn!(path = %path, role = %role, "Route check for unknown role");
                false
            }
        }
    }

    /// Check route access for a role.
    pub fn check_role_route_access(&self, path: &str, role: Role) -> bool {
        let path = normalize_path(path);

        if role.is_top_tier() {
            return true;
        }

        if self.table.is_public(&path) {
            return true;
        }

        for prefix in prefixes(&path) {
            if let Some(rule) = self.table.restricted_rule(prefix) {
                if !rule.allows(role) {
                    debug!(path = %path, prefix = %prefix, role = %role, "Route denied by restricted rule");
                    return false;
                }
            }
        }

        if let Some(rule) = self.table.grant_rule(&path) {
            return rule.allows(role);
        }

        for prefix in prefixes(&path) {
            if self.table.grant_rule(prefix).is_some_and(|r| r.allows(role)) {
                return true;
            }
            if self.table.restricted_rule(prefix).is_some_and(|r| !r.allows(role)) {
                return false;
            }
        }

        debug!(path = %path, role = %role, "Route denied, no matching rule");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RouteAccessMatcher {
        RouteAccessMatcher::marketplace().unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/dashboard/?tab=1"), "/dashboard");
        assert_eq!(normalize_path("//dashboard//wallet#top"), "/dashboard/wallet");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/?x=1"), "/");
        assert_eq!(normalize_path("dashboard"), "/dashboard");
    }

    #[test]
    fn test_prefixes() {
        let p = prefixes("/a/b/c");
        assert_eq!(p, vec!["/", "/a", "/a/b", "/a/b/c"]);
        let root = prefixes("/");
        assert_eq!(root, vec!["/"]);
    }

    #[test]
    fn test_admin_routes() {
        let m = matcher();
        assert!(m.check_route_access("/dashboard/admin", "admin"));
        assert!(!m.check_route_access("/dashboard/admin", "viewer"));
        assert!(!m.check_route_access("/dashboard/admin/users", "stakeholder"));
    }

    #[test]
    fn test_prefix_inheritance() {
        let m = matcher();
        assert!(m.check_route_access("/dashboard/advertiser/campaigns/new", "advertiser"));
        assert!(m.check_route_access("/dashboard/publisher/inventory", "seller"));
    }

    #[test]
    fn test_restricted_prefix_denies_other_roles() {
        let m = matcher();
        assert!(!m.check_route_access("/dashboard/advertiser/campaigns/new", "publisher"));
        assert!(!m.check_route_access("/dashboard/wallet", "viewer"));
        assert!(m.check_route_access("/dashboard/wallet", "advertiser"));
    }

    #[test]
    fn test_shorter_deny_beats_longer_grant() {
        let table = RouteTable::builder()
            .grant("/app", [Role::Viewer])
            .restrict("/app/billing", [Role::Advertiser])
            .grant("/app/billing/invoices", [Role::Viewer])
            .build()
            .unwrap();
        let m = RouteAccessMatcher::new(Arc::new(table));

        assert!(!m.check_role_route_access("/app/billing/invoices", Role::Viewer));
        assert!(m.check_role_route_access("/app/other", Role::Viewer));
    }

    #[test]
    fn test_nested_restriction() {
        let m = matcher();
        assert!(m.check_route_access("/dashboard/wallet/withdraw", "publisher"));
        assert!(!m.check_route_access("/dashboard/wallet/withdraw", "advertiser"));
        assert!(m.check_route_access("/dashboard/wallet/deposit", "advertiser"));
    }

    #[test]
    fn test_public_routes() {
        let m = matcher();
        assert!(m.check_route_access("/login?next=/dashboard", "viewer"));
        assert!(m.check_route_access("/", "viewer"));
        // Public entries are exact
        assert!(!m.check_route_access("/about/team", "viewer"));
    }

    #[test]
    fn test_closed_world() {
        let m = matcher();
        assert!(!m.check_route_access("/internal/metrics", "stakeholder"));
        assert!(!m.check_route_access("/dashboard", "not-a-role"));
        assert!(m.check_route_access("/internal/metrics", "admin"));
    }

    #[test]
    fn test_segment_boundaries() {
        let table = RouteTable::builder()
            .restrict("/dashboard/admin", [Role::Admin])
            .grant("/dashboard", [Role::Viewer])
            .build()
            .unwrap();
        let m = RouteAccessMatcher::new(Arc::new(table));
        assert!(m.check_role_route_access("/dashboard/administrator", Role::Viewer));
        assert!(!m.check_role_route_access("/dashboard/admin/x", Role::Viewer));
    }

    #[test]
    fn test_exact_grant_is_decisive() {
        let m = matcher();
        assert!(m.check_route_access("/dashboard/settings", "viewer"));
        assert!(!m.check_route_access("/dashboard/analytics", "viewer"));
        assert!(m.check_route_access("/dashboard/analytics/", "stakeholder"));
    }

    #[test]
    fn test_analytics_subpaths_stay_gated() {
        let m = matcher();
        assert!(!m.check_route_access("/dashboard/analytics/reports", "viewer"));
        assert!(!m.check_route_access("/dashboard/analytics/reports/2026?range=30d", "user"));
        assert!(m.check_route_access("/dashboard/analytics/reports", "advertiser"));
        assert!(m.check_route_access("/dashboard/analytics/reports", "stakeholder"));
    }

    #[test]
    fn test_denied_section_denies_its_subpaths() {
        let m = matcher();
        for prefix in m.table().grants.keys() {
            let nested = format!("{prefix}/nested/page");
            for role in Role::ALL {
                if !m.check_role_route_access(prefix, role) {
                    assert!(
                        !m.check_role_route_access(&nested, role),
                        "{role} denied {prefix} but allowed {nested}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let m = matcher();
        let first = m.check_route_access("/dashboard/wallet/history", "publisher");
        for _ in 0..3 {
            assert_eq!(m.check_route_access("/dashboard/wallet/history", "publisher"), first);
        }
    }

    #[test]
    fn test_builder_rejects_relative_prefix() {
        let err = RouteTable::builder()
            .grant("/ok", [Role::Viewer])
            .restrict("admin", [Role::Admin])
            .grant("also-bad", [Role::Viewer])
            .build()
            .unwrap_err();
        assert_eq!(err, CatalogError::InvalidRoutePrefix("admin".into()));
    }

    #[test]
    fn test_builder_merges_roles() {
        let table = RouteTable::builder()
            .grant("/reports/", [Role::Viewer])
            .grant("/reports", [Role::Stakeholder])
            .build()
            .unwrap();
        let rule = table.grant_rule("/reports").unwrap();
        assert!(rule.allows(Role::Viewer));
        assert!(rule.allows(Role::Stakeholder));
    }

    #[test]
    fn test_landing_paths() {
        let table = RouteTable::builder()
            .landing(Role::Viewer, "/home")
            .build()
            .unwrap();
        assert_eq!(table.landing_path(Role::Viewer), "/home");
        assert_eq!(table.landing_path(Role::Publisher), "/dashboard/publisher");

        let m = matcher();
        for role in Role::ALL {
            assert!(
                m.check_role_route_access(default_landing_path(role), role),
                "{role} cannot reach its landing path"
            );
        }
    }
}

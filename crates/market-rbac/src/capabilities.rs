//! # Capabilities
//!
//! Resolves what a role may do against a [`PermissionRegistry`].
//!
//! Two entry points share the same semantics:
//! - [`CapabilityResolver::check_permission`] walks one permission's parent chain
//! - [`CapabilityResolver::get_role_capabilities`] resolves the whole catalog in
//!   topological order and records the inheritance chain of each grant
//!
//! A permission is granted to a role iff the role is listed on it directly or
//! on any of its ancestors. Declaration order never matters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::error::CatalogResult;
use crate::permissions::PermissionCategory;
use crate::registry::PermissionRegistry;
use crate::roles::Role;

/// Environment variable that seeds the process-wide test-mode flag.
pub const TEST_MODE_ENV: &str = "MARKET_TEST_MODE";

static GLOBAL_TEST_MODE: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Switch that arms the test-mode bypass.
///
/// The bypass needs both this flag and a per-call opt-in through
/// [`CheckContext::bypass`]; neither alone grants anything.
///
/// [`TestMode::global`] is shared by the whole process and starts from the
/// `MARKET_TEST_MODE` environment variable. [`TestMode::isolated`] gives a
/// private switch, which is what tests should use.
#[derive(Debug, Clone)]
pub struct TestMode {
    flag: Arc<AtomicBool>,
}

impl TestMode {
    /// The process-wide flag.
    pub fn global() -> Self {
        let flag = GLOBAL_TEST_MODE.get_or_init(|| {
            let enabled = std::env::var(TEST_MODE_ENV)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            Arc::new(AtomicBool::new(enabled))
        });
        Self { flag: flag.clone() }
    }

    /// A private flag, initially off.
    pub fn isolated() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Arm the bypass.
    pub fn enable(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Disarm the bypass.
    pub fn disable(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Check whether the bypass is armed.
    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-call options for a permission check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckContext {
    /// Opt in to the test-mode bypass for this call.
    #[serde(default)]
    pub bypass_checks: bool,
}

impl CheckContext {
    /// Context that opts in to the test-mode bypass.
    pub fn bypass() -> Self {
        Self { bypass_checks: true }
    }
}

/// Resolved outcome of one permission for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// Permission id.
    pub permission_id: String,
    /// Whether the role holds the permission.
    pub granted: bool,
    /// Ancestors the grant flowed through, nearest first. Empty for direct grants.
    #[serde(default)]
    pub inherited_from: Vec<String>,
    /// Permission category.
    pub category: PermissionCategory,
    /// Permission description.
    pub description: String,
    /// Whether the permission is sensitive.
    pub is_sensitive: bool,
}

impl Capability {
    /// Check if the grant came through inheritance.
    pub fn is_inherited(&self) -> bool {
        !self.inherited_from.is_empty()
    }
}

/// Capability map for a role, with or without metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityMap {
    /// Permission id to granted flag.
    Flags(BTreeMap<String, bool>),
    /// Permission id to full capability record.
    Detailed(BTreeMap<String, Capability>),
}

impl CapabilityMap {
    /// Check whether a permission is granted in this map.
    pub fn is_granted(&self, permission_id: &str) -> bool {
        match self {
            CapabilityMap::Flags(flags) => flags.get(permission_id).copied().unwrap_or(false),
            CapabilityMap::Detailed(caps) => caps.get(permission_id).is_some_and(|c| c.granted),
        }
    }

    /// Number of permissions in the map.
    pub fn len(&self) -> usize {
        match self {
            CapabilityMap::Flags(flags) => flags.len(),
            CapabilityMap::Detailed(caps) => caps.len(),
        }
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full records, if this map carries metadata.
    pub fn detailed(&self) -> Option<&BTreeMap<String, Capability>> {
        match self {
            CapabilityMap::Detailed(caps) => Some(caps),
            CapabilityMap::Flags(_) => None,
        }
    }
}

/// Permission checks and capability resolution over a registry.
///
/// # Example
///
/// ```
/// use market_rbac::CapabilityResolver;
///
/// let resolver = CapabilityResolver::marketplace().unwrap();
///
/// // Direct grant
/// assert!(resolver.check_permission("campaign.create", "advertiser", None));
/// // Inherited through wallet.withdraw
/// assert!(resolver.check_permission("wallet.view", "publisher", None));
/// // Unknown role or permission is denied
/// assert!(!resolver.check_permission("campaign.create", "janitor", None));
/// assert!(!resolver.check_permission("campaign.delete", "advertiser", None));
///
/// let caps = resolver.get_role_capabilities("stakeholder", true);
/// let summary = &caps.detailed().unwrap()["analytics.summary"];
/// assert_eq!(summary.inherited_from, vec!["analytics.view", "analytics.export"]);
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    registry: Arc<PermissionRegistry>,
    test_mode: TestMode,
}

impl CapabilityResolver {
    /// Create a resolver bound to the process-wide test-mode flag.
    pub fn new(registry: Arc<PermissionRegistry>) -> Self {
        Self {
            registry,
            test_mode: TestMode::global(),
        }
    }

    /// Create a resolver over the marketplace catalog.
    pub fn marketplace() -> CatalogResult<Self> {
        Ok(Self::new(Arc::new(PermissionRegistry::marketplace()?)))
    }

    /// Use a specific test-mode switch instead of the global one.
    pub fn with_test_mode(mut self, test_mode: TestMode) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// The underlying registry.
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Check a permission for a role identifier.
    ///
    /// The role string is normalized first; unknown roles are denied.
    pub fn check_permission(
        &self,
        permission_id: &str,
        role: &str,
        context: Option<&CheckContext>,
    ) -> bool {
        match Role::parse(role) {
            Some(role) => self.check_role_permission(permission_id, role, context),
            None => {
                warn!(permission = %permission_id, role = %role, "Permission check for unknown role");
                false
            }
        }
    }

    /// Check a permission for a role.
    ///
    /// Order of evaluation:
    /// 1. Unknown permission: denied
    /// 2. Top-tier role: granted
    /// 3. Bypass opt-in with test mode armed: granted
    /// 4. Role listed on the permission or, walking up, on any ancestor: granted
    /// 5. Otherwise denied
    pub fn check_role_permission(
        &self,
        permission_id: &str,
        role: Role,
        context: Option<&CheckContext>,
    ) -> bool {
        let Some(permission) = self.registry.get(permission_id) else {
            warn!(permission = %permission_id, role = %role, "Permission check for unknown permission");
            return false;
        };

        if role.is_top_tier() {
            return true;
        }

        if context.is_some_and(|c| c.bypass_checks) && self.test_mode.is_active() {
            warn!(permission = %permission_id, role = %role, "Permission check bypassed in test mode");
            return true;
        }

        if permission.is_sensitive {
            info!(permission = %permission_id, role = %role, "Sensitive permission checked");
        }

        let mut current = Some(permission);
        while let Some(perm) = current {
            if perm.is_directly_allowed(role) {
                if perm.id != permission.id {
                    debug!(permission = %permission_id, via = %perm.id, role = %role, "Permission granted through parent");
                }
                return true;
            }
            current = perm.parent.as_deref().and_then(|parent| self.registry.get(parent));
        }

        false
    }

    /// Resolve every permission for a role identifier.
    ///
    /// Unknown roles resolve to an all-denied map.
    pub fn get_role_capabilities(&self, role: &str, include_metadata: bool) -> CapabilityMap {
        let resolved = match Role::parse(role) {
            Some(role) => self.resolve(role),
            None => {
                warn!(role = %role, "Capability resolution for unknown role");
                self.initial_capabilities(false)
            }
        };

        if include_metadata {
            CapabilityMap::Detailed(resolved)
        } else {
            CapabilityMap::Flags(
                resolved
                    .into_iter()
                    .map(|(id, cap)| (id, cap.granted))
                    .collect(),
            )
        }
    }

    /// Resolve every permission for a role, with inheritance chains.
    pub fn resolve(&self, role: Role) -> BTreeMap<String, Capability> {
        let mut caps = self.initial_capabilities(role.is_top_tier());
        if role.is_top_tier() {
            return caps;
        }

        // Direct grants.
        for perm in self.registry.iter() {
            if perm.is_directly_allowed(role) {
                if let Some(cap) = caps.get_mut(&perm.id) {
                    cap.granted = true;
                }
            }
        }

        // Inheritance, parents first.
        for perm in self.registry.topological_order() {
            let Some(parent) = perm.parent.as_deref() else {
                continue;
            };
            let parent_granted = caps.get(parent).is_some_and(|c| c.granted);
            if let Some(cap) = caps.get_mut(&perm.id) {
                if !cap.granted && parent_granted {
                    cap.granted = true;
                    cap.inherited_from = vec![parent.to_string()];
                }
            }
        }

        // Flatten chains. Parents are visited first, so their chains are complete.
        for perm in self.registry.topological_order() {
            let Some(parent) = caps
                .get(&perm.id)
                .and_then(|c| c.inherited_from.first())
                .cloned()
            else {
                continue;
            };
            let upstream = caps
                .get(&parent)
                .map(|c| c.inherited_from.clone())
                .unwrap_or_default();
            if let Some(cap) = caps.get_mut(&perm.id) {
                cap.inherited_from.truncate(1);
                cap.inherited_from.extend(upstream);
            }
        }

        caps
    }

    /// Ids of every permission granted to a role, sorted.
    pub fn granted_permissions(&self, role: Role) -> Vec<String> {
        self.resolve(role)
            .into_iter()
            .filter(|(_, cap)| cap.granted)
            .map(|(id, _)| id)
            .collect()
    }

    /// Check that a role holds every listed permission.
    pub fn has_all(&self, role: Role, permission_ids: &[&str]) -> bool {
        permission_ids
            .iter()
            .all(|id| self.check_role_permission(id, role, None))
    }

    /// Check that a role holds at least one listed permission.
    pub fn has_any(&self, role: Role, permission_ids: &[&str]) -> bool {
        permission_ids
            .iter()
            .any(|id| self.check_role_permission(id, role, None))
    }

    fn initial_capabilities(&self, granted: bool) -> BTreeMap<String, Capability> {
        self.registry
            .iter()
            .map(|perm| {
                (
                    perm.id.clone(),
                    Capability {
                        permission_id: perm.id.clone(),
                        granted,
                        inherited_from: Vec::new(),
                        category: perm.category,
                        description: perm.description.clone(),
                        is_sensitive: perm.is_sensitive,
                    },
                )
            })
            .collect()
    }
}

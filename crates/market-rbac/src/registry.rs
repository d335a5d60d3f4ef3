//! # Permission Registry
//!
//! Validated, immutable permission catalog. Construction checks that ids are
//! unique, that every parent resolves, and that the parent graph is acyclic,
//! then precomputes a topological order (parents before children).

use std::collections::{HashMap, VecDeque};

use crate::catalog::marketplace_permissions;
use crate::error::{CatalogError, CatalogResult};
use crate::permissions::{Permission, PermissionCategory};

/// Validated permission catalog.
///
/// # Example
///
/// ```
/// use market_rbac::{Permission, PermissionCategory, PermissionRegistry, Role};
///
/// let registry = PermissionRegistry::new(vec![
///     Permission::new("report.view", PermissionCategory::Analytics, "View")
///         .with_parent("report.manage"),
///     Permission::new("report.manage", PermissionCategory::Analytics, "Manage")
///         .allow(Role::Stakeholder),
/// ])
/// .unwrap();
///
/// let order: Vec<&str> = registry.topological_order().map(|p| p.id.as_str()).collect();
/// assert_eq!(order, vec!["report.manage", "report.view"]);
/// assert_eq!(registry.ancestors("report.view"), vec!["report.manage"]);
/// ```
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    /// Permissions in declaration order.
    permissions: Vec<Permission>,
    /// Permission id to position in `permissions`.
    index: HashMap<String, usize>,
    /// Positions ordered so every parent precedes its children.
    topo_order: Vec<usize>,
}

impl PermissionRegistry {
    /// Build a registry from a list of permissions.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::DuplicatePermission`] if an id is declared twice
    /// - [`CatalogError::UnknownParent`] if a parent id is not declared
    /// - [`CatalogError::ParentCycle`] if the parent graph has a cycle
    pub fn new(permissions: Vec<Permission>) -> CatalogResult<Self> {
        let mut index = HashMap::with_capacity(permissions.len());
        for (pos, perm) in permissions.iter().enumerate() {
            if index.insert(perm.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicatePermission(perm.id.clone()));
            }
        }

        for perm in &permissions {
            if let Some(parent) = &perm.parent {
                if !index.contains_key(parent) {
                    return Err(CatalogError::UnknownParent {
                        permission: perm.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let topo_order = topological_sort(&permissions, &index)?;

        tracing::debug!(permissions = permissions.len(), "Permission registry built");

        Ok(Self {
            permissions,
            index,
            topo_order,
        })
    }

    /// Build the marketplace dashboard catalog.
    pub fn marketplace() -> CatalogResult<Self> {
        Self::new(marketplace_permissions())
    }

    /// Look up a permission by id.
    pub fn get(&self, id: &str) -> Option<&Permission> {
        self.index.get(id).map(|&pos| &self.permissions[pos])
    }

    /// Check whether a permission id is declared.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Iterate permissions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// Iterate permissions so that every parent precedes its children.
    ///
    /// Roots keep declaration order; each parent's children follow in declaration order.
    pub fn topological_order(&self) -> impl Iterator<Item = &Permission> {
        self.topo_order.iter().map(|&pos| &self.permissions[pos])
    }

    /// Ancestor chain of a permission, nearest first.
    ///
    /// Returns an empty vector for root or unknown permissions.
    pub fn ancestors(&self, id: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.get(id).and_then(|p| p.parent.as_deref());
        while let Some(parent_id) = current {
            chain.push(parent_id);
            current = self.get(parent_id).and_then(|p| p.parent.as_deref());
        }
        chain
    }

    /// Direct children of a permission, in declaration order.
    pub fn children(&self, id: &str) -> Vec<&Permission> {
        self.permissions
            .iter()
            .filter(|p| p.parent.as_deref() == Some(id))
            .collect()
    }

    /// Permissions in a category, in declaration order.
    pub fn by_category(&self, category: PermissionCategory) -> Vec<&Permission> {
        self.permissions
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Number of declared permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// Kahn's algorithm over the parent forest.
///
/// Parent references must already be resolved through `index`.
fn topological_sort(
    permissions: &[Permission],
    index: &HashMap<String, usize>,
) -> CatalogResult<Vec<usize>> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); permissions.len()];
    let mut queue = VecDeque::new();

    for (pos, perm) in permissions.iter().enumerate() {
        match perm.parent.as_ref().and_then(|parent| index.get(parent)) {
            Some(&parent_pos) => children[parent_pos].push(pos),
            None => queue.push_back(pos),
        }
    }

    let mut order = Vec::with_capacity(permissions.len());
    while let Some(pos) = queue.pop_front() {
        order.push(pos);
        queue.extend(children[pos].iter().copied());
    }

    if order.len() < permissions.len() {
        let mut visited = vec![false; permissions.len()];
        for &pos in &order {
            visited[pos] = true;
        }
        // Every unvisited node lies on or below a cycle.
        let start = visited.iter().position(|v| !v).unwrap_or_default();
        return Err(CatalogError::ParentCycle(cycle_from(permissions, index, start)));
    }

    Ok(order)
}

/// Follow parent links from `start` until a node repeats and return the cycle.
fn cycle_from(permissions: &[Permission], index: &HashMap<String, usize>, start: usize) -> Vec<String> {
    let mut path: Vec<usize> = Vec::new();
    let mut current = Some(start);

    while let Some(pos) = current {
        if let Some(first) = path.iter().position(|&p| p == pos) {
            let mut cycle: Vec<String> = path[first..]
                .iter()
                .map(|&p| permissions[p].id.clone())
                .collect();
            cycle.push(permissions[pos].id.clone());
            return cycle;
        }
        path.push(pos);
        current = permissions[pos]
            .parent
            .as_ref()
            .and_then(|parent| index.get(parent).copied());
    }

    path.into_iter().map(|p| permissions[p].id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionCategory::Campaign;

    fn perm(id: &str, parent: Option<&str>) -> Permission {
        let p = Permission::new(id, Campaign, id);
        match parent {
            Some(parent) => p.with_parent(parent),
            None => p,
        }
    }

    #[test]
    fn test_marketplace_catalog_is_valid() {
        let registry = PermissionRegistry::marketplace().unwrap();
        assert_eq!(registry.len(), marketplace_permissions().len());
        assert!(registry.contains("wallet.withdraw"));
        assert!(!registry.contains("wallet.steal"));
    }

    #[test]
    fn test_topological_order_puts_parents_first() {
        let registry = PermissionRegistry::marketplace().unwrap();
        let order: Vec<&str> = registry.topological_order().map(|p| p.id.as_str()).collect();
        assert_eq!(order.len(), registry.len());

        for perm in registry.iter() {
            if let Some(parent) = &perm.parent {
                let child_pos = order.iter().position(|id| *id == perm.id).unwrap();
                let parent_pos = order.iter().position(|id| id == parent).unwrap();
                assert!(parent_pos < child_pos, "{} must precede {}", parent, perm.id);
            }
        }
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let registry = PermissionRegistry::marketplace().unwrap();
        assert_eq!(
            registry.ancestors("analytics.summary"),
            vec!["analytics.view", "analytics.export", "analytics.manage"]
        );
        assert!(registry.ancestors("analytics.manage").is_empty());
        assert!(registry.ancestors("missing").is_empty());
    }

    #[test]
    fn test_children() {
        let registry = PermissionRegistry::marketplace().unwrap();
        let ids: Vec<&str> = registry
            .children("campaign.manage")
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["campaign.edit", "campaign.create", "campaign.approve"]);
    }

    #[test]
    fn test_by_category() {
        let registry = PermissionRegistry::marketplace().unwrap();
        assert_eq!(registry.by_category(PermissionCategory::Wallet).len(), 5);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = PermissionRegistry::new(vec![perm("a", None), perm("a", None)]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicatePermission("a".into()));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let err = PermissionRegistry::new(vec![perm("a", Some("ghost"))]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownParent {
                permission: "a".into(),
                parent: "ghost".into()
            }
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let err = PermissionRegistry::new(vec![
            perm("root", None),
            perm("a", Some("c")),
            perm("b", Some("a")),
            perm("c", Some("b")),
        ])
        .unwrap_err();

        match err {
            CatalogError::ParentCycle(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
                for id in ["a", "b", "c"] {
                    assert!(cycle.iter().any(|c| c == id));
                }
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let err = PermissionRegistry::new(vec![perm("a", Some("a"))]).unwrap_err();
        assert_eq!(err, CatalogError::ParentCycle(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn test_cycle_reported_from_descendant() {
        // "d" hangs off the cycle; the report still names the cycle itself.
        let err = PermissionRegistry::new(vec![
            perm("d", Some("a")),
            perm("a", Some("b")),
            perm("b", Some("a")),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            CatalogError::ParentCycle(vec!["a".into(), "b".into(), "a".into()])
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = PermissionRegistry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }
}

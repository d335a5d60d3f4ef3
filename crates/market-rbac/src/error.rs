//! Error types for catalog construction
//!
//! Catalog errors are configuration faults detected while building a
//! [`PermissionRegistry`](crate::PermissionRegistry) or a
//! [`RouteTable`](crate::RouteTable). Runtime checks never return errors;
//! they resolve to denial.

use thiserror::Error;

/// Catalog configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two permissions share an id
    #[error("Duplicate permission id: {0}")]
    DuplicatePermission(String),

    /// A parent reference does not resolve to a declared permission
    #[error("Permission {permission} references unknown parent {parent}")]
    UnknownParent {
        /// Permission declaring the parent.
        permission: String,
        /// Parent id that could not be resolved.
        parent: String,
    },

    /// The parent graph contains a cycle
    #[error("Permission parent cycle: {}", .0.join(" -> "))]
    ParentCycle(Vec<String>),

    /// A route prefix is not an absolute path
    #[error("Invalid route prefix: {0}")]
    InvalidRoutePrefix(String),
}

/// Result type for catalog construction.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::DuplicatePermission(_) => "DUPLICATE_PERMISSION",
            CatalogError::UnknownParent { .. } => "UNKNOWN_PARENT",
            CatalogError::ParentCycle(_) => "PARENT_CYCLE",
            CatalogError::InvalidRoutePrefix(_) => "INVALID_ROUTE_PREFIX",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = CatalogError::ParentCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Permission parent cycle: a -> b -> a");
        assert_eq!(err.error_code(), "PARENT_CYCLE");
    }
}

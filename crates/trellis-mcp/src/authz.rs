//! Authorization filtering.
//!
//! A tool is visible to (and executable by) a caller only when the caller's
//! scope set intersects the tool's required scopes and the caller's role set
//! intersects the tool's required roles; each check is vacuously true when
//! the tool requires nothing. The filter is applied when listing the catalog
//! and again, defensively, at invocation time.

use crate::catalog::{ToolCatalog, ToolDefinition};

/// The identity a caller presents: scopes, roles, and an optional subject
/// used in logs. Verification of the credential that produced it is an
/// external concern; Trellis receives the identity pre-verified.
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity {
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    pub subject: Option<String>,
}

impl CallerIdentity {
    /// An identity with no scopes or roles.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build an identity from comma-separated header values.
    pub fn from_header_values(scopes: Option<&str>, roles: Option<&str>, subject: Option<&str>) -> Self {
        Self {
            scopes: split_csv(scopes),
            roles: split_csv(roles),
            subject: subject
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Decides which tools a caller may see and invoke.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationFilter;

impl AuthorizationFilter {
    /// Whether the caller satisfies the tool's scope and role requirements.
    pub fn can_access(&self, tool: &ToolDefinition, caller: &CallerIdentity) -> bool {
        intersects_or_vacuous(&tool.required_scopes, &caller.scopes)
            && intersects_or_vacuous(&tool.required_roles, &caller.roles)
    }

    /// The subset of the catalog visible to the caller, in catalog order.
    pub fn visible_tools<'c>(
        &self,
        catalog: &'c ToolCatalog,
        caller: &CallerIdentity,
    ) -> Vec<&'c ToolDefinition> {
        catalog
            .iter()
            .filter(|tool| self.can_access(tool, caller))
            .collect()
    }
}

fn intersects_or_vacuous(required: &[String], held: &[String]) -> bool {
    required.is_empty() || required.iter().any(|r| held.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{testing, CatalogBuilder};
    use trellis_core::GenerationPolicy;

    fn caller(scopes: &[&str], roles: &[&str]) -> CallerIdentity {
        CallerIdentity {
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            subject: None,
        }
    }

    #[test]
    fn no_requirements_admits_everyone() {
        let tool = testing::tool("get_customer", &[], &[]);
        assert!(AuthorizationFilter.can_access(&tool, &CallerIdentity::anonymous()));
    }

    #[test]
    fn scope_intersection_is_required() {
        let tool = testing::tool("get_customer", &["data.read"], &[]);
        assert!(!AuthorizationFilter.can_access(&tool, &CallerIdentity::anonymous()));
        assert!(AuthorizationFilter.can_access(&tool, &caller(&["data.read"], &[])));
        assert!(AuthorizationFilter.can_access(&tool, &caller(&["other", "data.read"], &[])));
        assert!(!AuthorizationFilter.can_access(&tool, &caller(&["other"], &[])));
    }

    #[test]
    fn scope_and_role_requirements_combine() {
        let tool = testing::tool("delete_customer", &["data.write"], &["admin"]);
        assert!(!AuthorizationFilter.can_access(&tool, &caller(&["data.write"], &[])));
        assert!(!AuthorizationFilter.can_access(&tool, &caller(&[], &["admin"])));
        assert!(AuthorizationFilter.can_access(&tool, &caller(&["data.write"], &["admin"])));
    }

    #[test]
    fn visible_tools_filters_the_catalog() {
        let policy = GenerationPolicy {
            default_scopes: vec!["data.read".to_string()],
            ..Default::default()
        };
        let catalog = CatalogBuilder::new(policy)
            .build(&testing::customer_model())
            .unwrap();
        assert!(!catalog.is_empty());

        let filter = AuthorizationFilter;
        assert!(filter
            .visible_tools(&catalog, &CallerIdentity::anonymous())
            .is_empty());
        assert_eq!(
            filter
                .visible_tools(&catalog, &caller(&["data.read"], &[]))
                .len(),
            catalog.len()
        );
    }

    #[test]
    fn identity_from_headers() {
        let identity = CallerIdentity::from_header_values(
            Some("data.read, data.write"),
            Some("agent"),
            Some("user:alice"),
        );
        assert_eq!(identity.scopes, vec!["data.read", "data.write"]);
        assert_eq!(identity.roles, vec!["agent"]);
        assert_eq!(identity.subject.as_deref(), Some("user:alice"));

        let empty = CallerIdentity::from_header_values(None, Some(" , "), None);
        assert!(empty.scopes.is_empty());
        assert!(empty.roles.is_empty());
    }
}

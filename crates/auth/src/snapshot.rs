//! Immutable policy snapshot and the `enforce` matcher.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::policy::{MethodRule, Policy, ResourcePattern};
use crate::Role;

#[derive(Debug, Clone)]
struct CompiledPolicy {
    policy: Policy,
    pattern: ResourcePattern,
    method: MethodRule,
}

/// Point-in-time materialization of every policy in the store.
///
/// Never mutated after construction; share it behind an `Arc` and replace the
/// pointer when the store changes.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    by_role: HashMap<Role, Vec<CompiledPolicy>>,
    role_order: Vec<Role>,
    skipped: usize,
    built_at: DateTime<Utc>,
}

impl PolicySnapshot {
    pub fn empty() -> Self {
        Self::from_policies(Vec::new())
    }

    /// Compile policies in storage order.
    ///
    /// Rows that fail validation are skipped (and logged): they can never grant
    /// access.
    pub fn from_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        let mut by_role: HashMap<Role, Vec<CompiledPolicy>> = HashMap::new();
        let mut role_order = Vec::new();
        let mut skipped = 0;

        for policy in policies {
            let (pattern, method) = match policy.compile() {
                Ok(compiled) => compiled,
                Err(e) => {
                    tracing::warn!(policy = %policy, error = %e, "skipping malformed stored policy");
                    skipped += 1;
                    continue;
                }
            };

            let entry = by_role.entry(policy.role.clone()).or_insert_with(|| {
                role_order.push(policy.role.clone());
                Vec::new()
            });
            entry.push(CompiledPolicy {
                policy,
                pattern,
                method,
            });
        }

        Self {
            by_role,
            role_order,
            skipped,
            built_at: Utc::now(),
        }
    }

    /// Every distinct role, in order of first appearance.
    pub fn roles(&self) -> &[Role] {
        &self.role_order
    }

    /// Policies for `role`, in storage order.
    pub fn policies_for(&self, role: &str) -> Vec<&Policy> {
        self.by_role
            .get(role)
            .map(|rules| rules.iter().map(|r| &r.policy).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_role.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored rows rejected while compiling.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// True iff at least one policy for `role` matches both path and method.
    pub fn enforce(&self, role: &str, path: &str, method: &str) -> bool {
        let Some(rules) = self.by_role.get(role) else {
            return false;
        };
        rules
            .iter()
            .any(|r| r.method.matches(method) && r.pattern.matches(path))
    }
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Pure matcher: same snapshot and inputs always yield the same answer.
pub fn enforce(snapshot: &PolicySnapshot, role: &str, path: &str, method: &str) -> bool {
    snapshot.enforce(role, path, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(role: &str, pattern: &str, method: &str) -> Policy {
        Policy::new(role, pattern.to_string(), method.to_string()).unwrap()
    }

    fn snapshot() -> PolicySnapshot {
        PolicySnapshot::from_policies(vec![
            policy("admin", "/v1/user/*", "DELETE"),
            policy("user", "/v1/product/:id", "GET"),
            policy("unauthorized", "/v1/user/login", "POST"),
            policy("superadmin", "/v1/*", "*"),
        ])
    }

    #[test]
    fn wildcard_policy_allows_matching_method_only() {
        let s = snapshot();
        assert!(enforce(&s, "admin", "/v1/user/123", "DELETE"));
        assert!(!enforce(&s, "admin", "/v1/user/123", "GET"));
    }

    #[test]
    fn parameterized_policy_matches_one_segment() {
        let s = snapshot();
        assert!(enforce(&s, "user", "/v1/product/42", "GET"));
        assert!(!enforce(&s, "user", "/v1/product/42/extra", "GET"));
    }

    #[test]
    fn any_method_wildcard() {
        let s = snapshot();
        assert!(enforce(&s, "superadmin", "/v1/anything/here", "PATCH"));
        assert!(!enforce(&s, "superadmin", "/v2/anything", "GET"));
    }

    #[test]
    fn role_and_method_are_case_sensitive() {
        let s = snapshot();
        assert!(!enforce(&s, "Admin", "/v1/user/123", "DELETE"));
        assert!(!enforce(&s, "admin", "/v1/user/123", "delete"));
    }

    #[test]
    fn unknown_role_is_denied() {
        assert!(!enforce(&snapshot(), "auditor", "/v1/user/123", "GET"));
    }

    #[test]
    fn roles_and_policies_keep_storage_order() {
        let s = PolicySnapshot::from_policies(vec![
            policy("user", "/b", "GET"),
            policy("admin", "/a", "GET"),
            policy("user", "/a", "GET"),
        ]);
        let roles: Vec<&str> = s.roles().iter().map(Role::as_str).collect();
        assert_eq!(roles, vec!["user", "admin"]);
        let patterns: Vec<&str> = s.policies_for("user").iter().map(|p| p.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/b", "/a"]);
    }

    #[test]
    fn duplicates_do_not_change_decisions() {
        let once = PolicySnapshot::from_policies(vec![policy("user", "/a", "GET")]);
        let twice = PolicySnapshot::from_policies(vec![
            policy("user", "/a", "GET"),
            policy("user", "/a", "GET"),
        ]);
        assert_eq!(once.enforce("user", "/a", "GET"), twice.enforce("user", "/a", "GET"));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let bad = Policy {
            role: Role::ADMIN,
            pattern: "no-leading-slash".to_string(),
            method: "GET".to_string(),
        };
        let s = PolicySnapshot::from_policies(vec![bad, policy("admin", "/ok", "GET")]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.skipped(), 1);
        assert!(!s.enforce("admin", "no-leading-slash", "GET"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a role with no policies is denied everything.
        #[test]
        fn role_without_policies_is_always_denied(
            path in "(/[a-z0-9]{0,6}){0,5}",
            method in "[A-Z]{3,6}",
        ) {
            let s = snapshot();
            prop_assert!(!s.enforce("nobody", &path, &method));
            prop_assert!(!PolicySnapshot::empty().enforce("admin", &path, &method));
        }

        /// Property: the matcher is deterministic for an identical snapshot.
        #[test]
        fn enforce_is_deterministic(
            role in prop::sample::select(vec!["admin", "user", "unauthorized", "superadmin"]),
            path in "(/[a-z0-9]{1,6}){1,4}",
            method in prop::sample::select(vec!["GET", "POST", "PUT", "DELETE"]),
        ) {
            let s = snapshot();
            let first = s.enforce(role, &path, method);
            for _ in 0..3 {
                prop_assert_eq!(s.enforce(role, &path, method), first);
            }
        }
    }
}

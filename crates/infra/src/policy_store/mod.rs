//! Durable role -> {pattern, method} storage.
//!
//! The store is the single writer of policy data. Every mutating call must be
//! durable before it returns so that a later `load` in any process sees it.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use portcullis_auth::{AuthzError, Policy, PolicyError, Role};
use portcullis_core::AdminError;

pub use in_memory::InMemoryPolicyStore;
pub use postgres::PostgresPolicyStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store deadline exceeded")]
    Timeout,

    #[error(transparent)]
    Invalid(#[from] PolicyError),
}

impl From<StoreError> for AuthzError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Timeout => AuthzError::Timeout,
            other => AuthzError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Invalid(e) => e.into(),
            StoreError::Timeout => AdminError::unavailable("store deadline exceeded"),
            StoreError::Unavailable(msg) => AdminError::unavailable(msg),
        }
    }
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Every stored policy, in storage order.
    async fn load(&self) -> Result<Vec<Policy>, StoreError>;

    /// Append a policy. Returns `false` when the triple was already present.
    async fn add_policy(&self, policy: &Policy) -> Result<bool, StoreError>;

    /// Remove a policy. Returns `false` when nothing matched.
    async fn remove_policy(&self, policy: &Policy) -> Result<bool, StoreError>;

    /// Every distinct role, in order of first appearance.
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let mut roles: Vec<Role> = Vec::new();
        for policy in self.load().await? {
            if !roles.contains(&policy.role) {
                roles.push(policy.role);
            }
        }
        Ok(roles)
    }

    /// Policies for one role, in storage order.
    async fn list_policies(&self, role: &Role) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|p| &p.role == role)
            .collect())
    }
}

use std::sync::RwLock;

use async_trait::async_trait;

use portcullis_auth::Policy;

use super::{PolicyStore, StoreError};

/// In-memory policy store for tests/dev.
///
/// Durable only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    rows: RwLock<Vec<Policy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policies(policies: impl IntoIterator<Item = Policy>) -> Self {
        let mut rows: Vec<Policy> = Vec::new();
        for p in policies {
            if !rows.contains(&p) {
                rows.push(p);
            }
        }
        Self {
            rows: RwLock::new(rows),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn load(&self) -> Result<Vec<Policy>, StoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.clone())
    }

    async fn add_policy(&self, policy: &Policy) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.contains(policy) {
            return Ok(false);
        }
        rows.push(policy.clone());
        Ok(true)
    }

    async fn remove_policy(&self, policy: &Policy) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let before = rows.len();
        rows.retain(|p| p != policy);
        Ok(rows.len() != before)
    }
}

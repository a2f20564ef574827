//! Owner of the current policy snapshot.
//!
//! Readers grab an `Arc<PolicySnapshot>` and never block on writers. Writers
//! are serialised: store mutation, reload and pointer swap happen under one
//! async lock, and the caller is acknowledged only after the swap.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use portcullis_auth::{AuthzError, Policy, PolicySnapshot, Role, SnapshotSource};

use crate::policy_store::{PolicyStore, StoreError};

pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    current: RwLock<Option<Arc<PolicySnapshot>>>,
    writer: tokio::sync::Mutex<()>,
}

async fn bounded<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "policy store call timed out");
            Err(StoreError::Timeout)
        }
    }
}

impl PolicyEngine {
    /// Create an engine with no snapshot; requests are denied until the first
    /// successful [`PolicyEngine::reload`].
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Create an engine and perform the initial load.
    pub async fn start(store: Arc<dyn PolicyStore>, deadline: Duration) -> Result<Arc<Self>, StoreError> {
        let engine = Arc::new(Self::new(store));
        let snapshot = engine.reload(deadline).await?;
        tracing::info!(
            policies = snapshot.len(),
            roles = snapshot.roles().len(),
            skipped = snapshot.skipped(),
            built_at = %snapshot.built_at(),
            "policy snapshot loaded"
        );
        Ok(engine)
    }

    /// The snapshot currently served to matchers, if any load has succeeded.
    pub fn current(&self) -> Option<Arc<PolicySnapshot>> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    /// Re-read the store and swap in a fresh snapshot.
    pub async fn reload(&self, deadline: Duration) -> Result<Arc<PolicySnapshot>, StoreError> {
        bounded(deadline, async {
            let _writer = self.writer.lock().await;
            self.reload_locked().await
        })
        .await
    }

    async fn reload_locked(&self) -> Result<Arc<PolicySnapshot>, StoreError> {
        let rows = self.store.load().await?;
        let snapshot = Arc::new(PolicySnapshot::from_policies(rows));
        let mut current = self
            .current
            .write()
            .map_err(|_| StoreError::Unavailable("snapshot lock poisoned".to_string()))?;
        *current = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Add a policy; durable and visible to this process on return.
    ///
    /// Returns `false` when the policy already existed.
    pub async fn add_policy(&self, policy: Policy, deadline: Duration) -> Result<bool, StoreError> {
        policy.validate()?;
        bounded(deadline, async {
            let _writer = self.writer.lock().await;
            let inserted = self.store.add_policy(&policy).await?;
            self.reload_locked().await?;
            tracing::info!(%policy, inserted, "policy added");
            Ok(inserted)
        })
        .await
    }

    /// Remove a policy. Removing an absent policy is a successful no-op.
    pub async fn remove_policy(&self, policy: Policy, deadline: Duration) -> Result<bool, StoreError> {
        policy.validate()?;
        bounded(deadline, async {
            let _writer = self.writer.lock().await;
            let removed = self.store.remove_policy(&policy).await?;
            self.reload_locked().await?;
            tracing::info!(%policy, removed, "policy removed");
            Ok(removed)
        })
        .await
    }

    /// Every distinct role in the store (read through, not from the snapshot).
    pub async fn list_roles(&self, deadline: Duration) -> Result<Vec<Role>, StoreError> {
        bounded(deadline, self.store.list_roles()).await
    }

    /// Policies for `role` in storage order (read through).
    pub async fn list_policies(&self, role: &Role, deadline: Duration) -> Result<Vec<Policy>, StoreError> {
        bounded(deadline, self.store.list_policies(role)).await
    }

    /// Periodically reload so that mutations made by other replicas converge.
    ///
    /// A failed reload keeps serving the previous snapshot.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; startup already loaded.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.reload(deadline).await {
                    Ok(snapshot) => tracing::debug!(
                        policies = snapshot.len(),
                        built_at = %snapshot.built_at(),
                        "policy snapshot refreshed"
                    ),
                    Err(e) => tracing::warn!(error = %e, "policy refresh failed; keeping previous snapshot"),
                }
            }
        })
    }
}

impl SnapshotSource for PolicyEngine {
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        self.current().ok_or_else(|| {
            AuthzError::StoreUnavailable("policy snapshot has not been loaded".to_string())
        })
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("loaded", &self.current().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_store::InMemoryPolicyStore;
    use async_trait::async_trait;
    use std::collections::HashSet;

    const DEADLINE: Duration = Duration::from_secs(5);

    fn policy(role: &str, pattern: &str, method: &str) -> Policy {
        Policy::new(role, pattern.to_string(), method.to_string()).unwrap()
    }

    /// Store whose every call takes longer than any reasonable deadline.
    struct SlowStore;

    #[async_trait]
    impl PolicyStore for SlowStore {
        async fn load(&self) -> Result<Vec<Policy>, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }

        async fn add_policy(&self, _policy: &Policy) -> Result<bool, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }

        async fn remove_policy(&self, _policy: &Policy) -> Result<bool, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }
    }

    async fn engine() -> Arc<PolicyEngine> {
        PolicyEngine::start(Arc::new(InMemoryPolicyStore::new()), DEADLINE)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mutation_is_visible_to_matcher_on_return() {
        let engine = engine().await;
        assert!(!engine.snapshot().unwrap().enforce("admin", "/v1/user/1", "DELETE"));

        engine
            .add_policy(policy("admin", "/v1/user/*", "DELETE"), DEADLINE)
            .await
            .unwrap();
        assert!(engine.snapshot().unwrap().enforce("admin", "/v1/user/1", "DELETE"));

        engine
            .remove_policy(policy("admin", "/v1/user/*", "DELETE"), DEADLINE)
            .await
            .unwrap();
        assert!(!engine.snapshot().unwrap().enforce("admin", "/v1/user/1", "DELETE"));
    }

    #[tokio::test]
    async fn old_snapshot_stays_valid_for_in_flight_readers() {
        let engine = engine().await;
        let before = engine.snapshot().unwrap();
        engine
            .add_policy(policy("user", "/a", "GET"), DEADLINE)
            .await
            .unwrap();
        assert!(before.is_empty());
        let after = engine.snapshot().unwrap();
        assert_eq!(after.len(), 1);
        assert!(after.built_at() >= before.built_at());
    }

    #[tokio::test]
    async fn add_twice_equals_add_once() {
        let engine = engine().await;
        let p = policy("admin", "/v1/user/*", "DELETE");
        assert!(engine.add_policy(p.clone(), DEADLINE).await.unwrap());
        assert!(!engine.add_policy(p, DEADLINE).await.unwrap());
        assert_eq!(engine.list_policies(&Role::ADMIN, DEADLINE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_policy_is_rejected_before_the_store() {
        let engine = engine().await;
        let bad = Policy {
            role: Role::ADMIN,
            pattern: "v1/user".to_string(),
            method: "GET".to_string(),
        };
        let err = engine.add_policy(bad, DEADLINE).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(engine.list_roles(DEADLINE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_adds_are_not_lost() {
        let engine = engine().await;

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .add_policy(policy("user", &format!("/v1/item/{i}"), "GET"), DEADLINE)
                        .await
                })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap().unwrap());
        }

        let listed = engine.list_policies(&Role::USER, DEADLINE).await.unwrap();
        assert_eq!(listed.len(), 100);
        let distinct: HashSet<_> = listed.iter().collect();
        assert_eq!(distinct.len(), 100);
        assert_eq!(engine.snapshot().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn unloaded_engine_fails_closed() {
        let engine = PolicyEngine::new(Arc::new(InMemoryPolicyStore::new()));
        assert!(matches!(
            engine.snapshot(),
            Err(AuthzError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let engine = PolicyEngine::new(Arc::new(SlowStore));
        let short = Duration::from_millis(50);

        assert_eq!(engine.reload(short).await.unwrap_err(), StoreError::Timeout);
        assert_eq!(
            engine
                .add_policy(policy("user", "/a", "GET"), short)
                .await
                .unwrap_err(),
            StoreError::Timeout
        );
        assert_eq!(
            AuthzError::from(StoreError::Timeout),
            AuthzError::Timeout
        );
    }

    #[tokio::test]
    async fn refresh_task_picks_up_external_writes() {
        let store = Arc::new(InMemoryPolicyStore::new());
        let engine = PolicyEngine::start(store.clone(), DEADLINE).await.unwrap();
        let task = engine.spawn_refresh(Duration::from_millis(20), DEADLINE);

        // Simulates another replica writing straight to shared storage.
        store.add_policy(&policy("user", "/a", "GET")).await.unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if engine.snapshot().unwrap().enforce("user", "/a", "GET") {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(seen, "refresh task never converged");
    }
}

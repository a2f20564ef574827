//! Infrastructure wiring: stores, policy engine, token service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use portcullis_auth::{Authorizer, BreakGlass, TokenService};
use portcullis_infra::{
    AccountStore, Argon2Hasher, CredentialHasher, GatewayConfig, InMemoryAccountStore,
    InMemoryPolicyStore, PolicyEngine, PolicyStore, PostgresAccountStore, PostgresPolicyStore,
    seed_from_file,
};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub engine: Arc<PolicyEngine>,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<dyn AccountStore>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub break_glass: BreakGlass,
    /// Deadline for every store call made on behalf of a request.
    pub store_timeout: Duration,
}

impl AppServices {
    pub fn authorizer(&self) -> Authorizer {
        Authorizer::new(self.tokens.clone(), self.engine.clone())
    }
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("engine", &self.engine)
            .field("break_glass", &self.break_glass.is_enabled())
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

/// Build services from configuration.
///
/// With `DATABASE_URL` set both stores live in Postgres, otherwise in memory.
/// The policy snapshot is loaded (and the optional seed applied) before this
/// returns, so the first request is never served without a snapshot.
pub async fn build_services(config: &GatewayConfig) -> anyhow::Result<AppServices> {
    let tokens = Arc::new(
        TokenService::new(config.signing_key.as_bytes(), config.token_ttls())
            .context("invalid token signing configuration")?,
    );

    let (policy_store, accounts): (Arc<dyn PolicyStore>, Arc<dyn AccountStore>) =
        match &config.database_url {
            Some(url) => {
                let policies = PostgresPolicyStore::connect(url)
                    .await
                    .context("failed to connect to Postgres")?;
                policies.ensure_schema().await.context("failed to create policy schema")?;
                let accounts = PostgresAccountStore::new(policies.pool().clone());
                accounts.ensure_schema().await.context("failed to create account schema")?;
                tracing::info!("using Postgres stores");
                (Arc::new(policies), Arc::new(accounts))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                (
                    Arc::new(InMemoryPolicyStore::new()),
                    Arc::new(InMemoryAccountStore::new()),
                )
            }
        };

    let engine = PolicyEngine::start(policy_store, config.store_timeout)
        .await
        .context("initial policy load failed")?;

    if let Some(path) = &config.policy_seed_path {
        seed_from_file(&engine, path, config.store_timeout)
            .await
            .with_context(|| format!("failed to apply policy seed {}", path.display()))?;
    }

    if let Some(every) = config.policy_refresh {
        engine.spawn_refresh(every, config.store_timeout);
        tracing::info!(every_secs = every.as_secs(), "periodic policy refresh enabled");
    }

    let break_glass = BreakGlass::new(config.break_glass.clone());
    if !break_glass.is_enabled() {
        tracing::info!("break-glass credential not configured; bootstrap routes are disabled");
    }

    Ok(AppServices {
        engine,
        tokens,
        accounts,
        hasher: Arc::new(Argon2Hasher),
        break_glass,
        store_timeout: config.store_timeout,
    })
}

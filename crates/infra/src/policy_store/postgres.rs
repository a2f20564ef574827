//! Postgres-backed policy store.
//!
//! Policies are rows of (role, pattern, method). The triple is the logical key
//! (unique constraint); the surrogate `id` only preserves storage order.
//! Every statement runs in autocommit mode, so a mutation is durable by the
//! time `execute` returns.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use portcullis_auth::{Policy, Role};

use super::{PolicyStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS policies (
    id          BIGSERIAL PRIMARY KEY,
    role        TEXT NOT NULL,
    pattern     TEXT NOT NULL,
    method      TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (role, pattern, method)
)
"#;

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[derive(Debug, Clone)]
pub struct PostgresPolicyStore {
    pool: PgPool,
}

impl PostgresPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(unavailable)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `policies` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn row_to_policy(row: &sqlx::postgres::PgRow) -> Result<Policy, StoreError> {
    let role: String = row.try_get("role").map_err(unavailable)?;
    let pattern: String = row.try_get("pattern").map_err(unavailable)?;
    let method: String = row.try_get("method").map_err(unavailable)?;
    // Unvalidated on purpose: malformed rows are dropped when the snapshot is
    // compiled, not here.
    Ok(Policy {
        role: Role::new(role),
        pattern,
        method,
    })
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    async fn load(&self) -> Result<Vec<Policy>, StoreError> {
        let rows = sqlx::query("SELECT role, pattern, method FROM policies ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter().map(row_to_policy).collect()
    }

    async fn add_policy(&self, policy: &Policy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO policies (role, pattern, method)
            VALUES ($1, $2, $3)
            ON CONFLICT (role, pattern, method) DO NOTHING
            "#,
        )
        .bind(policy.role.as_str())
        .bind(&policy.pattern)
        .bind(&policy.method)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_policy(&self, policy: &Policy) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM policies WHERE role = $1 AND pattern = $2 AND method = $3",
        )
        .bind(policy.role.as_str())
        .bind(&policy.pattern)
        .bind(&policy.method)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT role FROM policies GROUP BY role ORDER BY MIN(id)")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("role")
                    .map(Role::new)
                    .map_err(unavailable)
            })
            .collect()
    }

    async fn list_policies(&self, role: &Role) -> Result<Vec<Policy>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, pattern, method FROM policies WHERE role = $1 ORDER BY id",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.iter().map(row_to_policy).collect()
    }
}

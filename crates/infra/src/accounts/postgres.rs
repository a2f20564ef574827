//! Postgres-backed admin accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use portcullis_auth::Role;
use portcullis_core::{AccountId, SubjectId};

use super::{AccountStore, AccountStoreError, AdminAccount};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS admins (
        id             UUID PRIMARY KEY,
        full_name      TEXT NOT NULL,
        age            INTEGER NOT NULL,
        email          TEXT NOT NULL,
        username       TEXT NOT NULL UNIQUE,
        password_hash  TEXT NOT NULL,
        role           TEXT NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        subject     TEXT PRIMARY KEY,
        token       TEXT NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

fn unavailable(e: sqlx::Error) -> AccountStoreError {
    AccountStoreError::Unavailable(e.to_string())
}

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), AccountStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;
        }
        Ok(())
    }
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<AdminAccount, AccountStoreError> {
    let id: Uuid = row.try_get("id").map_err(unavailable)?;
    let role: String = row.try_get("role").map_err(unavailable)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(unavailable)?;
    Ok(AdminAccount {
        id: AccountId::from_uuid(id),
        full_name: row.try_get("full_name").map_err(unavailable)?,
        age: row.try_get("age").map_err(unavailable)?,
        email: row.try_get("email").map_err(unavailable)?,
        username: row.try_get("username").map_err(unavailable)?,
        password_hash: row.try_get("password_hash").map_err(unavailable)?,
        role: Role::new(role),
        created_at,
    })
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn create(&self, account: AdminAccount) -> Result<AdminAccount, AccountStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO admins (id, full_name, age, email, username, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.full_name)
        .bind(account.age)
        .bind(&account.email)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(account),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AccountStoreError::Conflict(account.username))
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AdminAccount>, AccountStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, age, email, username, password_hash, role, created_at
            FROM admins WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn delete_by_username(&self, username: &str) -> Result<bool, AccountStoreError> {
        let row = sqlx::query("DELETE FROM admins WHERE username = $1 RETURNING id")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        let Some(row) = row else {
            return Ok(false);
        };
        let id: Uuid = row.try_get("id").map_err(unavailable)?;
        sqlx::query("DELETE FROM refresh_tokens WHERE subject = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(true)
    }

    async fn record_refresh_token(&self, subject: &SubjectId, token: &str) -> Result<(), AccountStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (subject, token, updated_at)
            SELECT $1, $2, NOW()
            WHERE EXISTS (SELECT 1 FROM admins WHERE id::text = $1)
            ON CONFLICT (subject) DO UPDATE SET token = EXCLUDED.token, updated_at = NOW()
            "#,
        )
        .bind(subject.as_str())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        if result.rows_affected() == 0 {
            return Err(AccountStoreError::UnknownSubject(subject.clone()));
        }
        Ok(())
    }
}

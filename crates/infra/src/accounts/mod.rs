//! Admin account persistence.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use portcullis_auth::Role;
use portcullis_core::{AccountId, AdminError, SubjectId};

pub use in_memory::InMemoryAccountStore;
pub use postgres::PostgresAccountStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountStoreError {
    #[error("username already taken: {0}")]
    Conflict(String),

    /// No stored account owns this subject, e.g. because it was deleted.
    #[error("unknown subject: {0}")]
    UnknownSubject(SubjectId),

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

impl From<AccountStoreError> for AdminError {
    fn from(value: AccountStoreError) -> Self {
        match value {
            AccountStoreError::Conflict(username) => {
                AdminError::conflict(format!("username already taken: {username}"))
            }
            AccountStoreError::UnknownSubject(_) => AdminError::Unauthorized,
            AccountStoreError::Unavailable(msg) => AdminError::unavailable(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminAccount {
    pub id: AccountId,
    pub full_name: String,
    pub age: i32,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl AdminAccount {
    pub fn subject(&self) -> SubjectId {
        SubjectId::from(self.id)
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Usernames are unique.
    async fn create(&self, account: AdminAccount) -> Result<AdminAccount, AccountStoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<AdminAccount>, AccountStoreError>;

    /// Returns `false` when no account had that username.
    async fn delete_by_username(&self, username: &str) -> Result<bool, AccountStoreError>;

    /// Remember the most recently issued refresh token for `subject`.
    ///
    /// Fails with [`AccountStoreError::UnknownSubject`] when no account owns
    /// `subject`; nothing is written in that case.
    async fn record_refresh_token(&self, subject: &SubjectId, token: &str) -> Result<(), AccountStoreError>;
}

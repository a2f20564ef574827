use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use portcullis_core::SubjectId;

use super::{AccountStore, AccountStoreError, AdminAccount};

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, AdminAccount>>,
    refresh_tokens: RwLock<HashMap<SubjectId, String>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last refresh token recorded for `subject`.
    pub fn refresh_token_for(&self, subject: &SubjectId) -> Option<String> {
        self.refresh_tokens
            .read()
            .ok()
            .and_then(|tokens| tokens.get(subject).cloned())
    }
}

fn poisoned() -> AccountStoreError {
    AccountStoreError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: AdminAccount) -> Result<AdminAccount, AccountStoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&account.username) {
            return Err(AccountStoreError::Conflict(account.username));
        }
        accounts.insert(account.username.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AdminAccount>, AccountStoreError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(username).cloned())
    }

    async fn delete_by_username(&self, username: &str) -> Result<bool, AccountStoreError> {
        let removed = {
            let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
            accounts.remove(username)
        };
        if let Some(account) = &removed {
            self.refresh_tokens
                .write()
                .map_err(|_| poisoned())?
                .remove(&account.subject());
        }
        Ok(removed.is_some())
    }

    async fn record_refresh_token(&self, subject: &SubjectId, token: &str) -> Result<(), AccountStoreError> {
        // Held across the insert so a concurrent delete cannot slip in between.
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        if !accounts.values().any(|a| a.subject() == *subject) {
            return Err(AccountStoreError::UnknownSubject(subject.clone()));
        }
        self.refresh_tokens
            .write()
            .map_err(|_| poisoned())?
            .insert(subject.clone(), token.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_auth::Role;
    use portcullis_core::{AccountId, AdminError};

    fn account(username: &str) -> AdminAccount {
        AdminAccount {
            id: AccountId::new(),
            full_name: "Ada Lovelace".to_string(),
            age: 36,
            email: format!("{username}@example.com"),
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::ADMIN,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = InMemoryAccountStore::new();
        store.create(account("ada")).await.unwrap();
        let err = store.create(account("ada")).await.unwrap_err();
        assert_eq!(err, AccountStoreError::Conflict("ada".to_string()));
    }

    #[tokio::test]
    async fn delete_drops_account_and_refresh_token() {
        let store = InMemoryAccountStore::new();
        let created = store.create(account("ada")).await.unwrap();
        store
            .record_refresh_token(&created.subject(), "rt-1")
            .await
            .unwrap();
        assert_eq!(store.refresh_token_for(&created.subject()).as_deref(), Some("rt-1"));

        assert!(store.delete_by_username("ada").await.unwrap());
        assert!(!store.delete_by_username("ada").await.unwrap());
        assert!(store.find_by_username("ada").await.unwrap().is_none());
        assert!(store.refresh_token_for(&created.subject()).is_none());
    }

    #[tokio::test]
    async fn record_overwrites_previous_token() {
        let store = InMemoryAccountStore::new();
        let subject = store.create(account("ada")).await.unwrap().subject();
        store.record_refresh_token(&subject, "a").await.unwrap();
        store.record_refresh_token(&subject, "b").await.unwrap();
        assert_eq!(store.refresh_token_for(&subject).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn record_for_unknown_subject_writes_nothing() {
        let store = InMemoryAccountStore::new();
        let stranger = SubjectId::new("u-1");
        let err = store.record_refresh_token(&stranger, "a").await.unwrap_err();
        assert_eq!(err, AccountStoreError::UnknownSubject(stranger.clone()));
        assert!(store.refresh_token_for(&stranger).is_none());
    }

    #[tokio::test]
    async fn record_after_delete_does_not_resurrect_the_token() {
        let store = InMemoryAccountStore::new();
        let subject = store.create(account("ada")).await.unwrap().subject();
        store.record_refresh_token(&subject, "rt-1").await.unwrap();
        assert!(store.delete_by_username("ada").await.unwrap());

        let err = store.record_refresh_token(&subject, "rt-2").await.unwrap_err();
        assert!(matches!(err, AccountStoreError::UnknownSubject(_)));
        assert!(store.refresh_token_for(&subject).is_none());
        assert_eq!(AdminError::from(err), AdminError::Unauthorized);
    }
}

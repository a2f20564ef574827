//! Infrastructure layer: policy storage, account storage, configuration.

pub mod accounts;
pub mod config;
pub mod password;
pub mod policy_engine;
pub mod policy_store;
pub mod seed;

pub use accounts::{
    AccountStore, AccountStoreError, AdminAccount, InMemoryAccountStore, PostgresAccountStore,
};
pub use config::{ConfigError, GatewayConfig};
pub use password::{Argon2Hasher, CredentialHasher, HashError};
pub use policy_engine::PolicyEngine;
pub use policy_store::{InMemoryPolicyStore, PolicyStore, PostgresPolicyStore, StoreError};
pub use seed::{SeedError, parse_seed, seed_from_file};

//! `portcullis-auth`: request authorization engine.
//!
//! This crate is intentionally decoupled from HTTP and storage: it issues and
//! validates credentials, matches requests against an immutable policy
//! snapshot and folds both into a per-request decision.

pub mod authorize;
pub mod bootstrap;
pub mod claims;
pub mod policy;
pub mod roles;
pub mod snapshot;
pub mod token;

pub use authorize::{
    AccessRequest, AuthzDecision, AuthzError, Authorizer, DenialReason, Evaluation, Principal,
    SnapshotSource, StaticSnapshot, extract_credential,
};
pub use bootstrap::{BreakGlass, BreakGlassCredential};
pub use claims::{Claims, TokenKind, TokenStatus, TokenValidationError, validate_claims};
pub use policy::{MatchStrategy, MethodRule, Policy, PolicyError, ResourcePattern};
pub use roles::Role;
pub use snapshot::{PolicySnapshot, enforce};
pub use token::{TokenError, TokenPair, TokenService, TokenTtls};

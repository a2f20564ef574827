//! Per-request authorization state machine.
//!
//! credential? -> validate -> role -> enforce -> one of three outcomes.
//! Every failure on this path is resolved here; nothing propagates to the
//! business handler.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use portcullis_core::SubjectId;

use crate::claims::{TokenKind, TokenStatus};
use crate::snapshot::PolicySnapshot;
use crate::token::TokenService;
use crate::Role;

/// Infrastructure failure while obtaining the policy snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("policy store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("policy store deadline exceeded")]
    Timeout,
}

/// Provider of the policy snapshot current at the time of the call.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError>;
}

/// A fixed snapshot (tests, single-shot tools).
#[derive(Debug, Clone)]
pub struct StaticSnapshot(pub Arc<PolicySnapshot>);

impl SnapshotSource for StaticSnapshot {
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        Ok(self.0.clone())
    }
}

impl<S> SnapshotSource for Arc<S>
where
    S: SnapshotSource + ?Sized,
{
    fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        (**self).snapshot()
    }
}

/// What the middleware needs to know about an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub credential: Option<&'a str>,
}

/// Pull the bearer credential out of an `Authorization` header value.
///
/// Accepts `Bearer <token>` or the raw token. A missing or blank header means
/// "no credential", not an error.
pub fn extract_credential(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = match value.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
        _ => value,
    };
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzDecision {
    Allowed,
    Denied,
    ReauthenticationRequired,
}

/// Internal reason for a denial. Logged, never returned to the client.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    TokenInvalid,
    PolicyDenied,
    StoreUnavailable,
    Timeout,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::TokenInvalid => "token_invalid",
            DenialReason::PolicyDenied => "policy_denied",
            DenialReason::StoreUnavailable => "store_unavailable",
            DenialReason::Timeout => "timeout",
        }
    }
}

/// Identity the request was evaluated under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// `None` for anonymous requests.
    pub subject: Option<SubjectId>,
    pub role: Role,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            role: Role::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: AuthzDecision,
    pub principal: Principal,
    pub denial: Option<DenialReason>,
}

impl Evaluation {
    fn allowed(principal: Principal) -> Self {
        Self {
            decision: AuthzDecision::Allowed,
            principal,
            denial: None,
        }
    }

    fn denied(principal: Principal, reason: DenialReason) -> Self {
        Self {
            decision: AuthzDecision::Denied,
            principal,
            denial: Some(reason),
        }
    }

    fn reauthenticate() -> Self {
        Self {
            decision: AuthzDecision::ReauthenticationRequired,
            principal: Principal::anonymous(),
            denial: None,
        }
    }
}

/// Request authorization engine.
///
/// Both collaborators are injected; there is no process-wide enforcer.
#[derive(Clone)]
pub struct Authorizer {
    tokens: Arc<TokenService>,
    policies: Arc<dyn SnapshotSource>,
}

impl Authorizer {
    pub fn new(tokens: Arc<TokenService>, policies: Arc<dyn SnapshotSource>) -> Self {
        Self { tokens, policies }
    }

    /// Evaluate one request. Computed fresh every time; never cached.
    pub fn evaluate(&self, request: &AccessRequest<'_>) -> Evaluation {
        let principal = match request.credential {
            None => Principal::anonymous(),
            Some(token) => match self.tokens.validate_token(token, TokenKind::Access) {
                TokenStatus::Valid(claims) => Principal {
                    subject: Some(claims.sub),
                    role: claims.role,
                },
                TokenStatus::Expired => return Evaluation::reauthenticate(),
                TokenStatus::Invalid => {
                    return Evaluation::denied(Principal::anonymous(), DenialReason::TokenInvalid);
                }
            },
        };

        // Fail closed: no snapshot means no access.
        let snapshot = match self.policies.snapshot() {
            Ok(snapshot) => snapshot,
            Err(AuthzError::Timeout) => return Evaluation::denied(principal, DenialReason::Timeout),
            Err(AuthzError::StoreUnavailable(msg)) => {
                tracing::error!(error = %msg, "policy snapshot unavailable");
                return Evaluation::denied(principal, DenialReason::StoreUnavailable);
            }
        };

        if snapshot.enforce(principal.role.as_str(), request.path, request.method) {
            Evaluation::allowed(principal)
        } else {
            Evaluation::denied(principal, DenialReason::PolicyDenied)
        }
    }

    pub fn decide(&self, request: &AccessRequest<'_>) -> AuthzDecision {
        self.evaluate(request).decision
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

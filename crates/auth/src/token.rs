//! Token service: issues and validates signed, time-limited credentials.
//!
//! Tokens are bearer-stateless HS256 JWTs. The service owns the signing secret
//! for the process lifetime and keeps no other state, so there is no
//! revocation: a token stays valid until its own expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use thiserror::Error;

use portcullis_core::SubjectId;

use crate::claims::{Claims, TokenKind, TokenStatus, TokenValidationError, validate_claims};
use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The signing key is unusable or encoding failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A TTL shorter than one second cannot produce a valid time window.
    #[error("token ttl must be at least one second")]
    InvalidTtl,
}

/// Default lifetimes for the two credential kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(15 * 60),
            refresh: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A freshly minted access/refresh credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttls: TokenTtls,
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, ttls: TokenTtls) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }
        if secret.len() < 32 {
            tracing::warn!("signing secret is shorter than recommended (32 bytes)");
        }

        // Expiry is checked by `validate_claims` so that it is reported as a
        // distinct status with zero leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttls,
        })
    }

    /// Issue an access/refresh pair with explicit lifetimes.
    pub fn issue_token_pair(
        &self,
        subject: &SubjectId,
        role: &Role,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue_at(subject, role, TokenKind::Access, access_ttl, now)?,
            refresh_token: self.issue_at(subject, role, TokenKind::Refresh, refresh_ttl, now)?,
        })
    }

    /// Issue an access/refresh pair with the configured lifetimes.
    pub fn issue_default_pair(
        &self,
        subject: &SubjectId,
        role: &Role,
    ) -> Result<TokenPair, TokenError> {
        self.issue_token_pair(subject, role, self.ttls.access, self.ttls.refresh)
    }

    /// Issue a single credential as of `now`.
    pub fn issue_at(
        &self,
        subject: &SubjectId,
        role: &Role,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidTtl)?;
        if ttl_secs < 1 {
            return Err(TokenError::InvalidTtl);
        }

        // `exp` is rounded up to the next whole second so the token lives at
        // least `ttl` regardless of where in the second it was issued.
        let expires = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(TokenError::InvalidTtl)?;
        let exp = expires
            .timestamp()
            .saturating_add(i64::from(expires.timestamp_subsec_nanos() > 0));

        let claims = Claims {
            sub: subject.clone(),
            role: role.clone(),
            typ: kind,
            iat: now.timestamp(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a credential for the given use.
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> TokenStatus {
        self.validate_at(token, expected, Utc::now())
    }

    pub fn validate_at(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> TokenStatus {
        let data = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "token rejected during decode");
                return TokenStatus::Invalid;
            }
        };

        match validate_claims(&data.claims, expected, now) {
            Ok(()) => TokenStatus::Valid(data.claims),
            Err(TokenValidationError::Expired) => TokenStatus::Expired,
            Err(e) => {
                tracing::debug!(error = %e, "token claims rejected");
                TokenStatus::Invalid
            }
        }
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn service() -> TokenService {
        TokenService::new(SECRET, TokenTtls::default()).unwrap()
    }

    #[test]
    fn issued_access_token_round_trips_claims() {
        let svc = service();
        let pair = svc
            .issue_default_pair(&SubjectId::new("admin-7"), &Role::ADMIN)
            .unwrap();

        let TokenStatus::Valid(claims) = svc.validate_token(&pair.access_token, TokenKind::Access)
        else {
            panic!("expected a valid token");
        };
        assert_eq!(claims.sub.as_str(), "admin-7");
        assert_eq!(claims.role, Role::ADMIN);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let svc = service();
        let pair = svc
            .issue_default_pair(&SubjectId::new("u-1"), &Role::USER)
            .unwrap();

        assert_eq!(
            svc.validate_token(&pair.refresh_token, TokenKind::Access),
            TokenStatus::Invalid
        );
        assert!(svc.validate_token(&pair.refresh_token, TokenKind::Refresh).is_valid());
    }

    #[test]
    fn expired_token_is_expired_not_invalid() {
        let svc = service();
        let issued = Utc::now() - chrono::Duration::hours(2);
        let token = svc
            .issue_at(
                &SubjectId::new("u-1"),
                &Role::USER,
                TokenKind::Access,
                Duration::from_secs(60),
                issued,
            )
            .unwrap();

        assert_eq!(svc.validate_token(&token, TokenKind::Access), TokenStatus::Expired);
    }

    #[test]
    fn token_issued_late_in_a_second_lives_its_full_ttl() {
        let svc = service();
        let issued = DateTime::from_timestamp(1_900_000_000, 999_000_000).unwrap();
        let token = svc
            .issue_at(
                &SubjectId::new("u-1"),
                &Role::USER,
                TokenKind::Access,
                Duration::from_secs(1),
                issued,
            )
            .unwrap();

        let shortly_after = issued + chrono::Duration::milliseconds(2);
        assert!(svc.validate_at(&token, TokenKind::Access, shortly_after).is_valid());

        let just_before_ttl = issued + chrono::Duration::milliseconds(999);
        assert!(svc.validate_at(&token, TokenKind::Access, just_before_ttl).is_valid());

        let past_ttl = issued + chrono::Duration::milliseconds(1_002);
        assert_eq!(
            svc.validate_at(&token, TokenKind::Access, past_ttl),
            TokenStatus::Expired
        );
    }

    #[test]
    fn token_issued_on_a_second_boundary_expires_exactly_at_ttl() {
        let svc = service();
        let issued = DateTime::from_timestamp(1_900_000_000, 0).unwrap();
        let token = svc
            .issue_at(
                &SubjectId::new("u-1"),
                &Role::USER,
                TokenKind::Access,
                Duration::from_secs(60),
                issued,
            )
            .unwrap();

        let last_moment = issued + chrono::Duration::milliseconds(59_999);
        assert!(svc.validate_at(&token, TokenKind::Access, last_moment).is_valid());
        assert_eq!(
            svc.validate_at(&token, TokenKind::Access, issued + chrono::Duration::seconds(60)),
            TokenStatus::Expired
        );
    }

    #[test]
    fn foreign_secret_is_invalid() {
        let other = TokenService::new("another-secret-that-is-also-long-enough", TokenTtls::default())
            .unwrap();
        let pair = other
            .issue_default_pair(&SubjectId::new("u-1"), &Role::ADMIN)
            .unwrap();

        assert_eq!(
            service().validate_token(&pair.access_token, TokenKind::Access),
            TokenStatus::Invalid
        );
    }

    #[test]
    fn forged_and_expired_token_is_invalid() {
        let other = TokenService::new("another-secret-that-is-also-long-enough", TokenTtls::default())
            .unwrap();
        let token = other
            .issue_at(
                &SubjectId::new("u-1"),
                &Role::ADMIN,
                TokenKind::Access,
                Duration::from_secs(1),
                Utc::now() - chrono::Duration::hours(1),
            )
            .unwrap();

        assert_eq!(service().validate_token(&token, TokenKind::Access), TokenStatus::Invalid);
    }

    #[test]
    fn malformed_token_is_invalid() {
        assert_eq!(
            service().validate_token("not.a.jwt", TokenKind::Access),
            TokenStatus::Invalid
        );
        assert_eq!(service().validate_token("", TokenKind::Access), TokenStatus::Invalid);
    }

    #[test]
    fn empty_secret_is_a_signing_error() {
        assert!(matches!(
            TokenService::new("", TokenTtls::default()),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn sub_second_ttl_is_rejected() {
        let err = service()
            .issue_token_pair(
                &SubjectId::new("u-1"),
                &Role::USER,
                Duration::from_millis(500),
                Duration::from_secs(60),
            )
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidTtl);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: whatever subject/role pair is issued comes back unchanged.
        #[test]
        fn subject_and_role_round_trip(
            subject in "[a-zA-Z0-9_-]{1,32}",
            role in "[a-z]{1,16}",
        ) {
            let svc = service();
            let pair = svc
                .issue_default_pair(&SubjectId::new(subject.clone()), &Role::new(role.clone()))
                .unwrap();

            let status = svc.validate_token(&pair.access_token, TokenKind::Access);
            let claims = status.claims().cloned().unwrap();
            prop_assert_eq!(claims.sub.as_str(), subject.as_str());
            prop_assert_eq!(claims.role.as_str(), role.as_str());
        }
    }
}

//! Policy model: (role, resource-pattern, method) rules and their matching
//! strategies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use portcullis_core::AdminError;

use crate::Role;

/// Method token meaning "any method".
pub const ANY_METHOD: &str = "*";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("role must not be empty")]
    EmptyRole,

    #[error("malformed pattern '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: &'static str },

    #[error("malformed method '{0}': expected '*' or an upper-case token such as GET")]
    MalformedMethod(String),
}

impl From<PolicyError> for AdminError {
    fn from(value: PolicyError) -> Self {
        AdminError::validation(value.to_string())
    }
}

/// A permission rule as stored and exchanged with administrators.
///
/// Policies are plain data; they are validated and compiled when a
/// [`crate::PolicySnapshot`] is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub role: Role,
    #[serde(rename = "endpoint")]
    pub pattern: String,
    pub method: String,
}

impl Policy {
    /// Build a policy, rejecting input that could never match.
    pub fn new(
        role: impl Into<Role>,
        pattern: impl Into<String>,
        method: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let policy = Self {
            role: role.into(),
            pattern: pattern.into(),
            method: method.into(),
        };
        policy.compile()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        self.compile().map(|_| ())
    }

    pub(crate) fn compile(&self) -> Result<(ResourcePattern, MethodRule), PolicyError> {
        if self.role.as_str().trim().is_empty() {
            return Err(PolicyError::EmptyRole);
        }
        Ok((
            ResourcePattern::parse(&self.pattern)?,
            MethodRule::parse(&self.method)?,
        ))
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.role, self.pattern, self.method)
    }
}

/// Method side of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodRule {
    Any,
    Exact(String),
}

impl MethodRule {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        if raw == ANY_METHOD {
            return Ok(Self::Any);
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(PolicyError::MalformedMethod(raw.to_string()));
        }
        Ok(Self::Exact(raw.to_string()))
    }

    /// Case-sensitive: `get` never matches a `GET` rule.
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(m) => m == method,
        }
    }
}

/// How a pattern is compared against a concrete request path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// No wildcard, no parameters: byte-for-byte equality.
    Exact,
    /// Trailing `*` segment: matches whatever follows the prefix, including
    /// an empty remainder (`/v1/user/*` matches `/v1/user/`).
    Wildcard,
    /// `:name` segments each match exactly one non-empty segment.
    Parameterized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Wildcard,
}

/// A parsed resource pattern such as `/v1/user/*` or `/v1/product/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    raw: String,
    segments: Vec<Segment>,
    strategy: MatchStrategy,
}

impl ResourcePattern {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let malformed = |reason| PolicyError::MalformedPattern {
            pattern: raw.to_string(),
            reason,
        };

        if !raw.starts_with('/') {
            return Err(malformed("pattern must start with '/'"));
        }

        let parts: Vec<&str> = raw.split('/').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        for (idx, part) in parts.into_iter().enumerate() {
            let segment = if part == "*" {
                if idx != last {
                    return Err(malformed("'*' is only allowed as the final segment"));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(malformed("parameter segment needs a name"));
                }
                Segment::Param
            } else if part.contains('*') {
                return Err(malformed("'*' must be a whole segment"));
            } else {
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        let strategy = if matches!(segments.last(), Some(Segment::Wildcard)) {
            MatchStrategy::Wildcard
        } else if segments.iter().any(|s| matches!(s, Segment::Param)) {
            MatchStrategy::Parameterized
        } else {
            MatchStrategy::Exact
        };

        Ok(Self {
            raw: raw.to_string(),
            segments,
            strategy,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.strategy {
            MatchStrategy::Exact => self.raw == path,
            MatchStrategy::Wildcard | MatchStrategy::Parameterized => self.matches_segments(path),
        }
    }

    fn matches_segments(&self, path: &str) -> bool {
        let mut parts = path.split('/');
        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return parts.next().is_some(),
                Segment::Param => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(lit) => {
                    if parts.next() != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> ResourcePattern {
        ResourcePattern::parse(raw).unwrap()
    }

    #[test]
    fn strategy_is_selected_per_pattern() {
        assert_eq!(pattern("/v1/health").strategy(), MatchStrategy::Exact);
        assert_eq!(pattern("/v1/user/*").strategy(), MatchStrategy::Wildcard);
        assert_eq!(pattern("/v1/product/:id").strategy(), MatchStrategy::Parameterized);
        assert_eq!(pattern("/v1/:kind/*").strategy(), MatchStrategy::Wildcard);
    }

    #[test]
    fn exact_pattern_requires_equality() {
        let p = pattern("/v1/user/create");
        assert!(p.matches("/v1/user/create"));
        assert!(!p.matches("/v1/user/create/"));
        assert!(!p.matches("/v1/user"));
        assert!(!p.matches("/V1/user/create"));
    }

    #[test]
    fn trailing_wildcard_matches_any_suffix() {
        let p = pattern("/v1/user/*");
        assert!(p.matches("/v1/user/123"));
        assert!(p.matches("/v1/user/123/orders/9"));
        assert!(p.matches("/v1/user/"));
        assert!(!p.matches("/v1/user"));
        assert!(!p.matches("/v1/users/123"));
    }

    #[test]
    fn parameter_matches_exactly_one_segment() {
        let p = pattern("/v1/product/:id");
        assert!(p.matches("/v1/product/42"));
        assert!(!p.matches("/v1/product/42/extra"));
        assert!(!p.matches("/v1/product/"));
        assert!(!p.matches("/v1/product"));
    }

    #[test]
    fn parameters_before_wildcard() {
        let p = pattern("/v1/:kind/*");
        assert!(p.matches("/v1/user/1"));
        assert!(!p.matches("/v1//1"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for raw in ["v1/user", "", "/v1/*/x", "/v1/user*", "/v1/:/x"] {
            assert!(
                matches!(
                    ResourcePattern::parse(raw),
                    Err(PolicyError::MalformedPattern { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn method_rules() {
        assert_eq!(MethodRule::parse("*").unwrap(), MethodRule::Any);
        assert!(MethodRule::parse("GET").unwrap().matches("GET"));
        assert!(!MethodRule::parse("GET").unwrap().matches("get"));
        assert!(MethodRule::Any.matches("PATCH"));
        assert!(MethodRule::parse("get").is_err());
        assert!(MethodRule::parse("").is_err());
    }

    #[test]
    fn policy_new_validates_every_field() {
        assert!(Policy::new("admin", "/v1/user/*", "DELETE").is_ok());
        assert_eq!(
            Policy::new("", "/v1/user/*", "DELETE").unwrap_err(),
            PolicyError::EmptyRole
        );
        assert!(matches!(
            Policy::new("admin", "/v1/user/*", "delete"),
            Err(PolicyError::MalformedMethod(_))
        ));
    }

    #[test]
    fn policy_serializes_with_endpoint_field() {
        let p = Policy::new("user", "/v1/product/:id", "GET").unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["endpoint"], "/v1/product/:id");
        assert_eq!(json["role"], "user");
    }
}

use serde::Serialize;

use portcullis_auth::{Principal, Role};
use portcullis_core::SubjectId;

/// Identity a request was allowed under.
///
/// Inserted into request extensions by the authorization middleware; handlers
/// behind it may rely on it being present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalContext {
    subject: Option<SubjectId>,
    role: Role,
}

impl PrincipalContext {
    pub fn new(subject: Option<SubjectId>, role: Role) -> Self {
        Self { subject, role }
    }

    /// `None` for anonymous callers.
    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_anonymous(&self) -> bool {
        self.subject.is_none()
    }
}

impl From<Principal> for PrincipalContext {
    fn from(value: Principal) -> Self {
        Self::new(value.subject, value.role)
    }
}

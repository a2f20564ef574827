//! Break-glass superadmin credential.
//!
//! A narrow set of bootstrap operations (admin creation/deletion, policy
//! administration, role listing) is gated by a fixed username/password pair
//! instead of the token + policy flow. This bypasses [`crate::Authorizer`]
//! entirely and is a known weakness: the pair is not rotated and is sent as
//! query parameters. A production deployment should replace it with a real
//! `superadmin` role checked through the normal path.

use subtle::ConstantTimeEq;

use portcullis_core::AdminError;

#[derive(Clone, PartialEq, Eq)]
pub struct BreakGlassCredential {
    username: String,
    password: String,
}

impl BreakGlassCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl std::fmt::Debug for BreakGlassCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakGlassCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Gate for the bootstrap surface. Disabled when no credential is configured.
#[derive(Debug, Clone, Default)]
pub struct BreakGlass {
    credential: Option<BreakGlassCredential>,
}

impl BreakGlass {
    pub fn new(credential: Option<BreakGlassCredential>) -> Self {
        Self { credential }
    }

    pub fn disabled() -> Self {
        Self { credential: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.credential.is_some()
    }

    pub fn check(&self, username: Option<&str>, password: Option<&str>) -> Result<(), AdminError> {
        let Some(credential) = &self.credential else {
            tracing::warn!("break-glass request rejected: no superadmin credential configured");
            return Err(AdminError::Unauthorized);
        };
        match (username, password) {
            (Some(u), Some(p)) if credential.matches(u, p) => {
                tracing::info!("break-glass credential accepted");
                Ok(())
            }
            _ => {
                tracing::warn!("break-glass credential rejected");
                Err(AdminError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_configured_pair() {
        let gate = BreakGlass::new(Some(BreakGlassCredential::new("root", "hunter2")));
        assert!(gate.check(Some("root"), Some("hunter2")).is_ok());
        assert_eq!(gate.check(Some("root"), Some("hunter3")), Err(AdminError::Unauthorized));
        assert_eq!(gate.check(Some("rooT"), Some("hunter2")), Err(AdminError::Unauthorized));
        assert_eq!(gate.check(None, Some("hunter2")), Err(AdminError::Unauthorized));
    }

    #[test]
    fn disabled_gate_rejects_everything() {
        let gate = BreakGlass::disabled();
        assert!(!gate.is_enabled());
        assert_eq!(gate.check(Some(""), Some("")), Err(AdminError::Unauthorized));
    }

    #[test]
    fn debug_redacts_password() {
        let dbg = format!("{:?}", BreakGlassCredential::new("root", "hunter2"));
        assert!(!dbg.contains("hunter2"));
    }
}

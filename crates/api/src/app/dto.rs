use serde::{Deserialize, Serialize};

use portcullis_auth::{Policy, Role, TokenPair};

// -------------------------
// Request DTOs
// -------------------------

/// Break-glass credential, passed as query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct BreakGlassQuery {
    #[serde(rename = "super-username")]
    pub username: Option<String>,
    #[serde(rename = "super-password")]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyRequest {
    pub policy: Policy,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub full_name: String,
    pub age: i32,
    pub email: String,
    pub username: String,
    pub password: String,
    /// `superadmin` or `admin`; anything else is rejected.
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct PoliciesResponse {
    pub role: Role,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Serialize)]
pub struct PolicyMutationResponse {
    pub status: &'static str,
    pub policy: Policy,
    /// `false` when the mutation was a no-op (already present / absent).
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub status: &'static str,
    pub user_id: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionResponse {
    pub fn new(status: &'static str, user_id: impl Into<String>, role: Role, pair: TokenPair) -> Self {
        Self {
            status,
            user_id: user_id.into(),
            role,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

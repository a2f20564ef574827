//! Admin bootstrap, login and token refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use portcullis_auth::{Role, TokenKind, TokenPair, TokenStatus};
use portcullis_core::{AccountId, AdminError, AdminResult, SubjectId};
use portcullis_infra::{AccountStoreError, AdminAccount};

use crate::app::dto::{
    BreakGlassQuery, CreateAdminRequest, CredentialsRequest, RefreshRequest, SessionResponse,
};
use crate::app::errors;
use crate::app::routes::rbac::{check_break_glass, json_body};
use crate::app::services::AppServices;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn within<T, F>(deadline: Duration, fut: F) -> AdminResult<T>
where
    F: Future<Output = Result<T, AccountStoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(AdminError::from),
        Err(_) => Err(AdminError::unavailable("account store deadline exceeded")),
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_password(services: &Arc<AppServices>, password: String) -> AdminResult<String> {
    let hasher = services.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AdminError::unavailable(e.to_string()))?
        .map_err(|e| AdminError::unavailable(e.to_string()))
}

async fn verify_password(services: &Arc<AppServices>, hash: String, password: String) -> bool {
    let hasher = services.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
        .await
        .unwrap_or(false)
}

/// Issue a pair for `subject` and remember the refresh half.
async fn open_session(
    services: &AppServices,
    subject: &SubjectId,
    role: &Role,
) -> AdminResult<TokenPair> {
    let pair = services
        .tokens
        .issue_default_pair(subject, role)
        .map_err(|e| AdminError::unavailable(e.to_string()))?;
    within(
        services.store_timeout,
        services.accounts.record_refresh_token(subject, &pair.refresh_token),
    )
    .await?;
    Ok(pair)
}

fn requested_role(role: Option<&str>) -> AdminResult<Role> {
    match role.map(str::trim) {
        None | Some("") | Some("admin") => Ok(Role::ADMIN),
        Some("superadmin") => Ok(Role::SUPERADMIN),
        Some(other) => Err(AdminError::validation(format!(
            "role must be `admin` or `superadmin`, got `{other}`"
        ))),
    }
}

fn validate_create(body: &CreateAdminRequest) -> AdminResult<()> {
    if body.username.trim().is_empty() {
        return Err(AdminError::validation("username must not be empty"));
    }
    if body.password.is_empty() {
        return Err(AdminError::validation("password must not be empty"));
    }
    if !body.email.contains('@') {
        return Err(AdminError::validation("email is not valid"));
    }
    if body.age < 0 {
        return Err(AdminError::validation("age must not be negative"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /v1/auth/create - Create an admin account (break-glass)
pub async fn create_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<BreakGlassQuery>,
    body: Result<Json<CreateAdminRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let result = async {
        validate_create(&body)?;
        let role = requested_role(body.role.as_deref())?;
        let password_hash = hash_password(&services, body.password).await?;

        let account = AdminAccount {
            id: AccountId::new(),
            full_name: body.full_name,
            age: body.age,
            email: body.email,
            username: body.username.trim().to_string(),
            password_hash,
            role,
            created_at: Utc::now(),
        };
        let account = within(services.store_timeout, services.accounts.create(account)).await?;
        let pair = open_session(&services, &account.subject(), &account.role).await?;
        tracing::info!(username = %account.username, role = %account.role, "admin account created");
        Ok::<_, AdminError>((account, pair))
    }
    .await;

    match result {
        Ok((account, pair)) => (
            StatusCode::CREATED,
            Json(SessionResponse::new(
                "created",
                account.id.to_string(),
                account.role,
                pair,
            )),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// DELETE /v1/auth/delete - Delete an admin account (break-glass + password)
pub async fn delete_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<BreakGlassQuery>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let result = async {
        let account = within(
            services.store_timeout,
            services.accounts.find_by_username(&body.username),
        )
        .await?
        .ok_or_else(|| AdminError::not_found(format!("admin `{}`", body.username)))?;

        if !verify_password(&services, account.password_hash.clone(), body.password).await {
            return Err(AdminError::Unauthorized);
        }

        within(
            services.store_timeout,
            services.accounts.delete_by_username(&account.username),
        )
        .await?;
        tracing::info!(username = %account.username, "admin account deleted");
        Ok::<_, AdminError>(account)
    }
    .await;

    match result {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "deleted",
                "user_id": account.id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /v1/auth/login - Exchange admin credentials for a token pair
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let result = async {
        // Unknown user and wrong password answer the same way.
        let account = within(
            services.store_timeout,
            services.accounts.find_by_username(&body.username),
        )
        .await?
        .ok_or(AdminError::Unauthorized)?;

        if !verify_password(&services, account.password_hash.clone(), body.password).await {
            return Err(AdminError::Unauthorized);
        }

        let pair = open_session(&services, &account.subject(), &account.role).await?;
        Ok::<_, AdminError>((account, pair))
    }
    .await;

    match result {
        Ok((account, pair)) => (
            StatusCode::OK,
            Json(SessionResponse::new(
                "logged_in",
                account.id.to_string(),
                account.role,
                pair,
            )),
        )
            .into_response(),
        Err(AdminError::Unauthorized) => {
            errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid username or password")
        }
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /v1/user/refresh - Trade a refresh token for a new pair
///
/// The new pair keeps the subject and role of the presented refresh token.
/// Only subjects that still have a stored account can refresh; a deleted
/// admin's refresh token is answered with 401.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let claims = match services
        .tokens
        .validate_token(body.refresh_token.trim(), TokenKind::Refresh)
    {
        TokenStatus::Valid(claims) => claims,
        TokenStatus::Expired => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "token_expired", "refresh token expired");
        }
        TokenStatus::Invalid => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_token", "refresh token is invalid");
        }
    };

    match open_session(&services, &claims.sub, &claims.role).await {
        Ok(pair) => (
            StatusCode::OK,
            Json(SessionResponse::new(
                "refreshed",
                claims.sub.as_str(),
                claims.role,
                pair,
            )),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

//! Policy administration endpoints.
//!
//! Gated by the break-glass credential (`super-username` / `super-password`
//! query parameters), not by the authorization middleware.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use portcullis_auth::Role;
use portcullis_core::AdminError;

use crate::app::dto::{
    BreakGlassQuery, PoliciesResponse, PolicyMutationResponse, PolicyRequest, RolesResponse,
};
use crate::app::errors;
use crate::app::services::AppServices;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn check_break_glass(
    services: &AppServices,
    query: &BreakGlassQuery,
) -> Result<(), axum::response::Response> {
    services
        .break_glass
        .check(query.username.as_deref(), query.password.as_deref())
        .map_err(errors::admin_error_to_response)
}

pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(v)| v).map_err(|rejection| {
        errors::admin_error_to_response(AdminError::validation(rejection.body_text()))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /v1/rbac/roles - Every role that has at least one policy
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<BreakGlassQuery>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }

    match services.engine.list_roles(services.store_timeout).await {
        Ok(roles) => (StatusCode::OK, Json(RolesResponse { roles })).into_response(),
        Err(e) => errors::admin_error_to_response(e.into()),
    }
}

/// GET /v1/rbac/policies/:role - Policies attached to one role
pub async fn list_policies(
    Extension(services): Extension<Arc<AppServices>>,
    Path(role): Path<String>,
    Query(query): Query<BreakGlassQuery>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }

    let role = Role::new(role);
    match services.engine.list_policies(&role, services.store_timeout).await {
        Ok(policies) => (StatusCode::OK, Json(PoliciesResponse { role, policies })).into_response(),
        Err(e) => errors::admin_error_to_response(e.into()),
    }
}

/// POST /v1/rbac/add/policy - Add a (role, endpoint, method) rule
pub async fn add_policy(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<BreakGlassQuery>,
    body: Result<Json<PolicyRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }
    let policy = match json_body(body) {
        Ok(req) => req.policy,
        Err(resp) => return resp,
    };

    match services
        .engine
        .add_policy(policy.clone(), services.store_timeout)
        .await
    {
        Ok(changed) => (
            StatusCode::OK,
            Json(PolicyMutationResponse {
                status: "added",
                policy,
                changed,
            }),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e.into()),
    }
}

/// DELETE /v1/rbac/delete/policy - Remove a rule (absent rules are a no-op)
pub async fn remove_policy(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<BreakGlassQuery>,
    body: Result<Json<PolicyRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = check_break_glass(&services, &query) {
        return resp;
    }
    let policy = match json_body(body) {
        Ok(req) => req.policy,
        Err(resp) => return resp,
    };

    match services
        .engine
        .remove_policy(policy.clone(), services.store_timeout)
        .await
    {
        Ok(changed) => (
            StatusCode::OK,
            Json(PolicyMutationResponse {
                status: "deleted",
                policy,
                changed,
            }),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e.into()),
    }
}

use axum::{
    extract::Extension,
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "subject": principal.subject().map(|s| s.as_str()),
        "role": principal.role().as_str(),
        "anonymous": principal.is_anonymous(),
    }))
}

/// Reached only after the request was allowed; there is no business handler
/// mounted for it in this process.
pub async fn no_upstream(
    method: Method,
    uri: Uri,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    tracing::debug!(role = %principal.role(), %method, path = %uri.path(), "allowed request has no upstream");
    errors::json_error(
        StatusCode::NOT_FOUND,
        "no_upstream",
        format!("no handler for {method} {}", uri.path()),
    )
}

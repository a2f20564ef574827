use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use portcullis_core::AdminError;

pub fn admin_error_to_response(err: AdminError) -> axum::response::Response {
    let status = match &err {
        AdminError::Validation(_) | AdminError::InvalidId(_) => StatusCode::BAD_REQUEST,
        AdminError::NotFound(_) => StatusCode::NOT_FOUND,
        AdminError::Conflict(_) => StatusCode::CONFLICT,
        AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
        AdminError::Unavailable(msg) => {
            tracing::error!(error = %msg, "administrative request failed on storage");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use portcullis_auth::{AccessRequest, AuthzDecision, Authorizer, extract_credential};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone, Debug)]
pub struct AuthState {
    pub authorizer: Authorizer,
}

/// Gate every request through the authorizer.
///
/// `Allowed` continues with a [`PrincipalContext`] extension. The denial
/// reason is logged and never sent to the client.
pub async fn authorize(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();
    let credential = bearer(req.headers()).map(str::to_string);

    let eval = state.authorizer.evaluate(&AccessRequest {
        path: &path,
        method: &method,
        credential: credential.as_deref(),
    });

    match eval.decision {
        AuthzDecision::Allowed => {
            tracing::debug!(
                role = %eval.principal.role,
                path = %path,
                method = %method,
                "request allowed"
            );
            req.extensions_mut()
                .insert(PrincipalContext::from(eval.principal));
            next.run(req).await
        }
        AuthzDecision::Denied => {
            tracing::info!(
                role = %eval.principal.role,
                path = %path,
                method = %method,
                reason = eval.denial.map(|r| r.as_str()).unwrap_or("unknown"),
                "request denied"
            );
            json_error(
                StatusCode::FORBIDDEN,
                "permission_denied",
                "you don't have permission to access this resource",
            )
        }
        AuthzDecision::ReauthenticationRequired => {
            tracing::info!(path = %path, method = %method, "access token expired");
            json_error(
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "access token expired",
            )
        }
    }
}

// Stand-in for a header that is not valid UTF-8; it never validates, so the
// request is denied rather than downgraded to anonymous.
const UNREADABLE_CREDENTIAL: &str = "<unreadable>";

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    match header.to_str() {
        Ok(value) => extract_credential(Some(value)),
        Err(_) => Some(UNREADABLE_CREDENTIAL),
    }
}

use axum::{
    Router,
    routing::{delete, get, post},
};

pub mod auth;
pub mod rbac;
pub mod system;

/// Routes that carry their own credentials (break-glass query parameters or
/// username/password bodies) and bypass the authorization middleware.
///
/// A request on one of these paths with a method the route does not serve is
/// answered 405 by the router itself. It never reaches the middleware and no
/// handler runs.
pub fn bootstrap_router() -> Router {
    Router::new()
        .route("/v1/rbac/roles", get(rbac::list_roles))
        .route("/v1/rbac/policies/:role", get(rbac::list_policies))
        .route("/v1/rbac/add/policy", post(rbac::add_policy))
        .route("/v1/rbac/delete/policy", delete(rbac::remove_policy))
        .route("/v1/auth/create", post(auth::create_admin))
        .route("/v1/auth/delete", delete(auth::delete_admin))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/user/refresh", post(auth::refresh))
}

/// Routes behind the authorization middleware. Anything unmatched is allowed
/// or denied like any other path and then answered by the fallback.
pub fn protected_router() -> Router {
    Router::new()
        .route("/v1/whoami", get(system::whoami))
        .fallback(system::no_upstream)
}

//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (stores, policy engine, tokens)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        authorizer: services.authorizer(),
    };

    // Every path not served by the bootstrap router goes through the
    // authorizer. Wrong-method requests on bootstrap paths stop at the router.
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::authorize,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::bootstrap_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

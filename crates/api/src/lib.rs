//! HTTP front door: authorization middleware, policy administration and
//! the bootstrap account endpoints.

pub mod app;
pub mod context;
pub mod middleware;

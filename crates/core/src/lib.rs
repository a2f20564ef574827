//! `portcullis-core`: shared building blocks for the gateway crates.
//!
//! This crate contains **pure** primitives (no IO, no HTTP, no storage).

pub mod error;
pub mod id;

pub use error::{AdminError, AdminResult};
pub use id::{AccountId, SubjectId};

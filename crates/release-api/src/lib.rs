//! Release-management API client.
//!
//! Thin async wrappers over the REST endpoints used to upload an artifact
//! and make it installable, plus the lookups a caller needs to pick an app.

pub mod apps;
pub mod client;
pub mod error;
pub mod types;

pub use apps::filter_apps;
pub use client::{Client, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use types::ApiToken;

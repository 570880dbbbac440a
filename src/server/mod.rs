//! HTTP server exposing sessions over REST.
//!
//! A thin layer over [`crate::session::Session`]: it owns an in-memory
//! session store and maps core errors to HTTP statuses.
//!
//! # Endpoints
//!
//! - `GET  /health`: liveness probe
//! - `/api/v1/sessions/...`: session, Part, graph, workflow and pipeline calls

pub mod error;
pub mod routes;
pub mod store;

pub use error::ApiError;
pub use routes::{app_router, AppState};
pub use store::SessionStore;

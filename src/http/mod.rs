//! HTTP layer
//!
//! Axum router and request handlers for the HLS endpoints.

pub mod handlers;
pub mod routes;

pub use routes::create_router;

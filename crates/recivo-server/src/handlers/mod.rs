//! HTTP route handlers for the recivo server.

pub mod receipt;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

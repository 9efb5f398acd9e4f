//! Business logic for the route handlers.

pub mod receipt;

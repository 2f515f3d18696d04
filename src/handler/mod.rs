//! Request handler module
//!
//! Entry point for every request: fixed endpoints, the admin surface, and
//! the dynamic namespace (through the interceptor).

pub mod docs;
pub mod dynamic;
pub mod router;

// Re-export main entry point
pub use router::handle_request;

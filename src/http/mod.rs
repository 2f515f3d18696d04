//! HTTP protocol layer module
//!
//! Response builders shared by the router, the admin surface and the
//! interceptor.

pub mod response;

// Re-export commonly used types
pub use response::{
    apply_cors, build_404_response, build_405_response, build_413_response, build_health_response,
    build_json_error, build_json_response, build_options_response,
};

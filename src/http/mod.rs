//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the
//! render logic.

pub mod mime;
pub mod query;
pub mod request_id;
pub mod response;

// Re-export commonly used types
pub use query::parse_query;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use response::{
    build_404_response, build_405_response, build_500_response, build_file_response,
    build_health_response,
};

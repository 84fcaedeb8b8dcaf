//! HTTP routing and response helpers.

pub mod extract;
pub mod response;
pub mod routes;

pub use response::ApiResponse;
pub use routes::router;

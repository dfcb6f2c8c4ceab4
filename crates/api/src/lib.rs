//! HTTP API layer for gifted.
//!
//! - **Endpoints**: accounts, posts, comments, likes, follows, notifications, feeds
//! - **Extractors**: authenticated user, pagination, image uploads
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;

pub use endpoints::router;
pub use middleware::AppState;

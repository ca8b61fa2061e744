//! # Actix Middleware Library
//!
//! Shared middleware components for the direct-chat Actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer token authentication middleware
//! - `logging`: request/response logging
//! - `metrics`: Prometheus metrics middleware
//! - `request_id`: `x-request-id` propagation

pub mod jwt_auth;
pub mod logging;
pub mod metrics;
pub mod request_id;

pub use jwt_auth::{AuthError, AuthenticatedUser, JwtAuth};
pub use logging::Logging;
pub use metrics::MetricsMiddleware;
pub use request_id::{request_id, CurrentRequestId, RequestId, REQUEST_ID_HEADER};

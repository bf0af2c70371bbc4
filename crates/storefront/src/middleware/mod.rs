//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Identity is not a layer: cart routes take the [`RequireUser`] extractor.

pub mod identity;
pub mod request_id;

pub use identity::{IdentityRejection, RequireUser};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

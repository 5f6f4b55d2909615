//! # Data Retrieval Module
//!
//! The request-style half of the client: a retry-wrapped HTTP client for the
//! backend's REST endpoints, and the time-boxed cache the accessors read
//! through. Push-style data arrives over the transport module instead.
//!
//! ## Contained Modules:
//!
//! - **`http`**: `ApiClient`, built on `reqwest` and `reqwest-middleware`
//!   with automatic exponential-backoff retries, decoding the backend's
//!   `{ success, data }` response envelope.
//!
//! - **`cache`**: `TimedCache`, a keyed freshness-window cache with
//!   stale-fallback-on-failure and out-of-order completion protection.

/// Backend HTTP client with retry middleware.
pub mod http;
/// Time-boxed cache with stale fallback.
pub mod cache;

// --- Public API Re-exports ---
pub use cache::TimedCache;
pub use http::{ApiClient, ServiceEnvelope};

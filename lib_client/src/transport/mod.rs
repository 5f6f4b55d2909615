//! # Transport Module
//!
//! The WebSocket wrapper that owns the single streaming connection to the
//! backend. Everything above this module speaks channels, not sockets: the
//! connection manager sends [`TransportCommand`]s and consumes
//! [`TransportEvent`]s, which keeps the lifecycle logic testable without a
//! network.

/// The tokio-tungstenite transport task with built-in bounded reconnection.
pub mod ws;

// --- Public API Re-exports ---
pub use ws::{TransportCommand, TransportEvent, TransportSettings, WsTransport};

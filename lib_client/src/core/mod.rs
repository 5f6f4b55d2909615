//! # Core Client Engine
//!
//! The components that turn raw transport traffic into the typed event flow
//! the 3D layers consume.
//!
//! ## Core Components:
//!
//! - **`connection`**: the lifecycle layer. Connect/disconnect semantics,
//!   room join/leave control messages, reconnect bookkeeping, and the event
//!   pump feeding the router.
//!
//! - **`router`**: the normalizer. Rewrites the backend's legacy and current
//!   wire shapes into one canonical event taxonomy, dropping unrecognized
//!   message kinds so newer backends never crash older clients.
//!
//! - **`registry`**: the fan-out. Insertion-ordered pub/sub with per-callback
//!   panic isolation, so a broken subscriber cannot starve its siblings.

/// Lifecycle layer over the WebSocket transport: status, rooms, event pump.
pub mod connection;
/// Subscriber fan-out with panic isolation.
pub mod registry;
/// Wire-to-canonical message normalization.
pub mod router;

// --- Public API Re-exports ---
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, RoomRef};
pub use registry::{SubscriberRegistry, SubscriptionId};
pub use router::{CanonicalEvent, EventKind, Router};

//! # OfficeStream Client Library
//!
//! Realtime state-synchronization client feeding the OfficeStream 3D
//! "virtual office" front ends with live backend state: agent positions and
//! status, task flows, collaboration graphs, and meeting/pipeline activity.
//!
//! The crate is a library component only: no CLI, no persisted state. The
//! rendering layers consume it through [`client::OfficeClient`]: connect,
//! subscribe to canonical events, and read the cached accessors. Everything
//! else (transport, routing, caching) stays behind that surface.

// Declare the modules to re-export
pub mod client;
pub mod config;
pub mod core;
pub mod model;
pub mod retrieve;
pub mod transport;

// Re-export the primary types
pub use self::client::OfficeClient;
pub use self::config::ClientConfig;
pub use self::core::connection::{ConnectionState, ConnectionStatus, RoomRef};
pub use self::core::registry::SubscriptionId;
pub use self::core::router::{CanonicalEvent, EventKind};
pub use self::model::Vec3;

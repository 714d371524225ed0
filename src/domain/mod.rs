//! Domain layer for pixel-relay.
//!
//! Contains the canonical types shared across all modules:
//! - `Event`: one recorded occurrence with its session context
//! - `Session`: identity and start instant of a client lifetime
//! - `LocationInfo`: cached geolocation enrichment
//! - `PageContext`: host-supplied url/referrer/user agent
//! - `RelayError`: top-level error type

pub mod error;
pub mod event;
pub mod location;
pub mod page;
pub mod session;

pub use error::RelayError;
pub use event::{Event, EventData, EventType};
pub use location::LocationInfo;
pub use page::PageContext;
pub use session::Session;

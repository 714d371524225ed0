// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Millisecond durations fit in u64
    clippy::cast_precision_loss,      // Scroll math works on page coordinates
    clippy::cast_sign_loss,           // Depth is clamped non-negative first
    clippy::missing_errors_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. ClientState in client module
    clippy::must_use_candidate        // Annotated selectively on critical APIs
)]

pub mod app;
pub mod buffer;
pub mod client;
pub mod domain;
pub mod location;
pub mod scheduler;
pub mod sender;
pub mod tracker;

// Re-export main types for easy access
pub use app::{App, Config};
pub use client::{ClientState, PixelClient, RelaySettings};
pub use domain::{Event, EventData, EventType, LocationInfo, PageContext, Session};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

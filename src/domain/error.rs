use thiserror::Error;

/// Top-level error type for the relay client.
///
/// Only bootstrap and lifecycle misuse surface as errors; delivery and
/// enrichment failures degrade silently and are logged instead.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client already started")]
    AlreadyStarted,
}

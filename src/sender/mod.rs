pub mod client;
pub mod diagnostic;
pub mod serialization;
pub mod transmission;

pub use client::{ClientConfig, ClientError, ClientStats, ConnectionStats, HttpClient};
pub use diagnostic::DiagnosticTransport;
pub use serialization::{BatchSerializer, SerializationError};
pub use transmission::{HttpTransport, TransmissionError, TransmissionResult};

use crate::buffer::Batch;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::time::Duration;

/// Stateless delivery primitive towards the collector.
///
/// `send` must resolve to `Ok` only on a positive acknowledgment; every other
/// outcome is an `Err` and leads to the batch being requeued.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> BoxFuture<'a, Result<TransmissionResult, TransmissionError>>;

    /// Termination-safe one-way delivery. Returns as soon as the batch has been
    /// accepted; the outcome is never reported back.
    fn beacon(&self, _batch: Batch) -> Result<(), TransmissionError> {
        Err(TransmissionError::BeaconUnsupported)
    }

    /// Waits up to `budget` for accepted beacons to finish. Returns whether
    /// everything settled in time.
    fn settle(&self, _budget: Duration) -> BoxFuture<'_, bool> {
        futures::future::ready(true).boxed()
    }

    fn name(&self) -> &'static str;
}

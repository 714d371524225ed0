use super::{TransmissionError, TransmissionResult, Transport};
use crate::buffer::Batch;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Debug-mode transport: every batch is printed to the log and kept in memory
/// instead of leaving the process. Always reports success.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticTransport {
    delivered: Arc<Mutex<Vec<Batch>>>,
}

impl DiagnosticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Batch> {
        self.delivered.lock().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }

    fn record(&self, batch: Batch) {
        for (row, event) in batch.events().iter().enumerate() {
            info!(
                batch_id = %batch.id(),
                row,
                event_type = %event.event_type(),
                url = %event.url(),
                timestamp = %event.timestamp(),
                data = %serde_json::Value::Object(event.data().clone()),
                "[pixel] diagnostic delivery"
            );
        }
        self.delivered.lock().push(batch);
    }
}

impl Transport for DiagnosticTransport {
    fn send<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> BoxFuture<'a, Result<TransmissionResult, TransmissionError>> {
        let result = TransmissionResult {
            status_code: 200,
            latency: Duration::ZERO,
            batch_id: batch.id().to_string(),
            bytes_sent: 0,
            compressed: false,
        };
        self.record(batch.clone());
        futures::future::ready(Ok(result)).boxed()
    }

    fn beacon(&self, batch: Batch) -> Result<(), TransmissionError> {
        self.record(batch);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "diagnostic"
    }
}

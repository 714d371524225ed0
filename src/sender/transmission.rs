use super::serialization::{BatchSerializer, SerializationError};
use super::{ClientConfig, ClientError, HttpClient, Transport};
use crate::buffer::Batch;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{
    CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] SerializationError),
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Collector rejected batch: HTTP {status}")]
    HttpError { status: u16 },
    #[error("Transmission timeout")]
    Timeout,
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
    #[error("Termination-safe delivery unavailable")]
    BeaconUnsupported,
}

#[derive(Debug, Clone)]
pub struct TransmissionResult {
    pub status_code: u16,
    pub latency: Duration,
    pub batch_id: String,
    pub bytes_sent: usize,
    pub compressed: bool,
}

/// Collector transport over HTTP POST.
///
/// `send` is the ordinary request/response path used by the flush loop.
/// `beacon` hands the request to a tracked background task and returns at
/// once; `settle` waits for those tasks during termination.
#[derive(Clone)]
pub struct HttpTransport {
    pub client: HttpClient,
    serializer: BatchSerializer,
    beacons: TaskTracker,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, TransmissionError> {
        Ok(Self::from_client(HttpClient::new(config)?))
    }

    pub fn from_client(client: HttpClient) -> Self {
        Self {
            client,
            serializer: BatchSerializer::new(),
            beacons: TaskTracker::new(),
        }
    }

    pub async fn send_batch(&self, batch: &Batch) -> Result<TransmissionResult, TransmissionError> {
        let start = Instant::now();
        let batch_id = batch.id().to_string();
        let batch_size = batch.size();

        debug!(batch_id = %batch_id, events = batch_size, "Sending batch");

        let use_compression = self.client.config.enable_compression
            && batch_size > self.client.config.compression_threshold;
        let payload = self.prepare_payload(batch, use_compression)?;
        let bytes_sent = payload.len();
        let headers = self.build_headers(batch, use_compression)?;

        let response = self
            .client
            .client
            .post(self.client.collector_url.clone())
            .headers(headers)
            .timeout(self.client.config.timeout)
            .body(payload)
            .send()
            .await;

        let latency = start.elapsed();
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.client.stats.record_request(false, latency, bytes_sent);
                if e.is_timeout() {
                    return Err(TransmissionError::Timeout);
                }
                return Err(TransmissionError::RequestError(e));
            }
        };

        let status_code = response.status().as_u16();
        let success = response.status().is_success();
        self.client.stats.record_request(success, latency, bytes_sent);

        if !success {
            warn!(batch_id = %batch_id, status = status_code, "Collector rejected batch");
            return Err(TransmissionError::HttpError {
                status: status_code,
            });
        }

        info!(
            batch_id = %batch_id,
            events = batch_size,
            bytes = bytes_sent,
            latency_ms = latency.as_millis() as u64,
            "Batch delivered"
        );

        Ok(TransmissionResult {
            status_code,
            latency,
            batch_id,
            bytes_sent,
            compressed: use_compression,
        })
    }

    pub fn prepare_payload(
        &self,
        batch: &Batch,
        compress: bool,
    ) -> Result<Vec<u8>, SerializationError> {
        if compress {
            self.serializer.serialize_compressed(batch)
        } else {
            self.serializer.serialize_json(batch)
        }
    }

    pub fn build_headers(
        &self,
        batch: &Batch,
        compressed: bool,
    ) -> Result<HeaderMap, TransmissionError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if compressed {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }

        headers.insert(
            HeaderName::from_static("x-batch-id"),
            HeaderValue::from_str(batch.id()).map_err(|e| {
                TransmissionError::InvalidHeaderValue(format!("Invalid batch ID: {e}"))
            })?,
        );

        headers.insert(
            HeaderName::from_static("x-batch-size"),
            HeaderValue::from(batch.size() as u64),
        );

        headers.insert(
            HeaderName::from_static("x-batch-trigger"),
            HeaderValue::from_static(batch.trigger().as_str()),
        );

        headers.insert(
            HeaderName::from_static("x-relay-version"),
            HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
        );

        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.client.config.user_agent).map_err(|e| {
                TransmissionError::InvalidHeaderValue(format!("Invalid user agent: {e}"))
            })?,
        );

        Ok(headers)
    }

    /// Number of beacon deliveries still running.
    pub fn pending_beacons(&self) -> usize {
        self.beacons.len()
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> BoxFuture<'a, Result<TransmissionResult, TransmissionError>> {
        self.send_batch(batch).boxed()
    }

    fn beacon(&self, batch: Batch) -> Result<(), TransmissionError> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return Err(TransmissionError::BeaconUnsupported);
        };

        let transport = self.clone();
        self.client.stats.record_beacon();
        self.beacons.spawn_on(
            async move {
                if let Err(e) = transport.send_batch(&batch).await {
                    warn!(batch_id = %batch.id(), error = %e, "Beacon delivery failed");
                }
            },
            &handle,
        );
        Ok(())
    }

    fn settle(&self, budget: Duration) -> BoxFuture<'_, bool> {
        async move {
            self.beacons.close();
            let settled = tokio::time::timeout(budget, self.beacons.wait())
                .await
                .is_ok();
            self.beacons.reopen();
            settled
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.client.endpoint())
            .field("pending_beacons", &self.pending_beacons())
            .finish()
    }
}

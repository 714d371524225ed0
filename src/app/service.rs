use super::Config;
use super::shutdown::{TerminationSignal, wait_for_termination_signal};
use crate::client::PixelClient;
use crate::domain::{EventData, EventType, RelayError};
use crate::location::{GeoLookup, IpApiLookup, LookupError};
use crate::scheduler::TerminationOutcome;
use crate::sender::{HttpTransport, TransmissionError, Transport};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::app::ConfigError),
    #[error("Client error: {0}")]
    RelayError(#[from] RelayError),
    #[error("Transport error: {0}")]
    TransportError(#[from] TransmissionError),
    #[error("Geo lookup error: {0}")]
    LookupError(#[from] LookupError),
    #[error("Input error: {0}")]
    InputError(#[from] std::io::Error),
}

/// One line of the event input stream.
#[derive(Debug, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub data: EventData,
    /// Navigation: updates the page URL before the event is recorded.
    #[serde(default)]
    pub url: Option<String>,
}

/// Runs one client session fed by newline-delimited JSON events.
pub struct RelayService {
    client: Arc<PixelClient>,
}

impl RelayService {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let mut builder = PixelClient::builder(config.relay_settings()).page(config.page_context());

        if !config.debug {
            let transport: Arc<dyn Transport> =
                Arc::new(HttpTransport::new(config.client_config())?);
            builder = builder.transport(transport);
        }

        if !config.disable_geo {
            let lookup: Arc<dyn GeoLookup> = Arc::new(IpApiLookup::new(config.geo_config())?);
            builder = builder.geo_lookup(lookup);
        }

        let client = Arc::new(builder.build()?);
        info!(
            session_id = %client.session_id(),
            endpoint = %config.endpoint,
            debug = config.debug,
            "Relay service initialized"
        );
        Ok(Self { client })
    }

    pub fn from_client(client: Arc<PixelClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<PixelClient> {
        &self.client
    }

    /// Starts the client, feeds it from `input` until the input closes or a
    /// termination signal arrives, then runs the termination flush.
    pub async fn run<R>(&self, input: R) -> Result<TerminationOutcome, ServiceError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.client.start()?;

        self.client.spawn_page_view();

        let signal = tokio::select! {
            result = self.consume(input) => {
                result?;
                TerminationSignal::EndOfInput
            }
            signal = wait_for_termination_signal() => signal,
        };

        info!(?signal, "Session ending");
        Ok(self.client.terminate().await)
    }

    async fn consume<R>(&self, input: R) -> Result<(), ServiceError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.ingest_line(line_no, line);
        }

        debug!(lines = line_no, "Input closed");
        Ok(())
    }

    /// Parses one input line and tracks it. Malformed lines are skipped.
    pub fn ingest_line(&self, line_no: usize, line: &str) -> bool {
        match serde_json::from_str::<InboundEvent>(line) {
            Ok(inbound) => {
                if let Some(url) = inbound.url {
                    self.client.recorder().page().set_url(url);
                }
                self.client.track(inbound.event_type, inbound.data);
                true
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed event line");
                false
            }
        }
    }
}

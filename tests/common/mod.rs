#![allow(dead_code)]

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use pixel_relay::buffer::Batch;
use pixel_relay::domain::{Event, EventData, EventType, LocationInfo, PageContext};
use pixel_relay::location::{GeoLookup, LookupError};
use pixel_relay::sender::{TransmissionError, TransmissionResult, Transport};
use pixel_relay::{PixelClient, RelaySettings};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    Fail,
}

/// In-memory transport whose outcomes follow a script. Once the script runs
/// out every send succeeds.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    delivered: Mutex<Vec<Vec<Event>>>,
    beacons: Mutex<Vec<Vec<Event>>>,
    attempts: AtomicUsize,
    beacon_supported: bool,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: &[Step]) -> Self {
        Self {
            script: Mutex::new(steps.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn with_beacon(mut self) -> Self {
        self.beacon_supported = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<Vec<Event>> {
        self.delivered.lock().clone()
    }

    pub fn delivered_events(&self) -> Vec<Event> {
        self.delivered.lock().iter().flatten().cloned().collect()
    }

    pub fn beacons(&self) -> Vec<Vec<Event>> {
        self.beacons.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        batch: &'a Batch,
    ) -> BoxFuture<'a, Result<TransmissionResult, TransmissionError>> {
        async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let step = self.script.lock().pop_front().unwrap_or(Step::Succeed);
            match step {
                Step::Fail => Err(TransmissionError::HttpError { status: 503 }),
                Step::Succeed => {
                    self.delivered.lock().push(batch.events().to_vec());
                    Ok(TransmissionResult {
                        status_code: 200,
                        latency: Duration::ZERO,
                        batch_id: batch.id().to_string(),
                        bytes_sent: 0,
                        compressed: false,
                    })
                }
            }
        }
        .boxed()
    }

    fn beacon(&self, batch: Batch) -> Result<(), TransmissionError> {
        if !self.beacon_supported {
            return Err(TransmissionError::BeaconUnsupported);
        }
        self.beacons.lock().push(batch.into_events());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Geo lookup that counts calls and answers after `delay` (or never).
pub struct CountingLookup {
    calls: AtomicUsize,
    delay: Option<Duration>,
    answer: LocationInfo,
}

impl CountingLookup {
    pub fn answering(answer: LocationInfo, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
            answer,
        }
    }

    pub fn stalled() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            answer: LocationInfo::unknown(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeoLookup for CountingLookup {
    fn lookup(&self) -> BoxFuture<'_, Result<LocationInfo, LookupError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match self.delay {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(self.answer.clone())
                }
                None => futures::future::pending().await,
            }
        }
        .boxed()
    }
}

pub fn tokyo() -> LocationInfo {
    LocationInfo {
        country: "Japan".to_string(),
        city: "Tokyo".to_string(),
        region: "Tokyo".to_string(),
        ip: Some("203.0.11...".to_string()),
    }
}

pub fn settings(batch_interval: Duration, heartbeat_interval: Duration) -> RelaySettings {
    RelaySettings {
        batch_interval,
        heartbeat_interval,
        ..RelaySettings::default()
    }
}

pub fn client_with(
    settings: RelaySettings,
    transport: Arc<ScriptedTransport>,
) -> PixelClient {
    PixelClient::builder(settings)
        .page(PageContext::new("https://shop.example/", "https://search.example/", "test-agent"))
        .transport(transport)
        .build()
        .expect("client builds")
}

pub fn click(label: &str) -> Event {
    let mut data = EventData::new();
    data.insert("label".to_string(), label.into());
    Event::new(EventType::Click, data, "https://shop.example/", "", "session", "test-agent")
}

pub fn label(event: &Event) -> String {
    event.data()["label"].as_str().unwrap_or_default().to_string()
}

pub fn count_of(events: &[Event], event_type: &EventType) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

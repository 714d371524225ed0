//! Session-scoped telemetry client.
//!
//! A [`PixelClient`] owns one session's queue, caches and timers. It moves
//! through `Bootstrapping → Active → Terminating → Ended`; several clients can
//! live side by side without sharing any state.

use crate::buffer::{BatchTrigger, EventQueue, QueueMetricsSnapshot};
use crate::domain::{Event, EventData, EventType, LocationInfo, PageContext, RelayError, Session};
use crate::location::{DisabledLookup, GeoLookup, LocationResolver};
use crate::scheduler::{
    Batcher, DEFAULT_BATCH_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL, FlushOutcome, FlushStats,
    HeartbeatScheduler, TaskHandle, TerminationFlusher, TerminationOutcome,
};
use crate::sender::{DiagnosticTransport, Transport};
use crate::tracker::{Recorder, ScrollDepthTracker};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientState {
    Bootstrapping,
    Active,
    Terminating,
    Ended,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClientState::Bootstrapping => "bootstrapping",
            ClientState::Active => "active",
            ClientState::Terminating => "terminating",
            ClientState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Boot-time knobs of a client. Not mutable after `build()`.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub batch_interval: Duration,
    pub heartbeat_interval: Duration,
    pub geo_timeout: Duration,
    /// Time `terminate()` waits for outstanding deliveries.
    pub termination_budget: Duration,
    /// Redirect every delivery to the in-process diagnostic surface.
    pub debug: bool,
    pub queue_warn_threshold: Option<usize>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            batch_interval: DEFAULT_BATCH_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            geo_timeout: crate::location::resolver::DEFAULT_LOOKUP_TIMEOUT,
            termination_budget: Duration::from_secs(4),
            debug: false,
            queue_warn_threshold: None,
        }
    }
}

/// Internal state exposed in debug mode.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub session_id: String,
    pub state: ClientState,
    pub queued: Vec<Event>,
    pub queue_metrics: QueueMetricsSnapshot,
    pub flush_stats: FlushStats,
    pub heartbeats: u64,
    pub delivered_batches: usize,
    pub location: Option<LocationInfo>,
}

pub struct PixelClientBuilder {
    settings: RelaySettings,
    page: Option<PageContext>,
    session: Option<Session>,
    transport: Option<Arc<dyn Transport>>,
    geo: Option<Arc<dyn GeoLookup>>,
}

impl PixelClientBuilder {
    pub fn page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn geo_lookup(mut self, lookup: Arc<dyn GeoLookup>) -> Self {
        self.geo = Some(lookup);
        self
    }

    pub fn build(self) -> Result<PixelClient, RelayError> {
        let settings = self.settings;
        if settings.batch_interval.is_zero() || settings.heartbeat_interval.is_zero() {
            return Err(RelayError::Config(
                "batch and heartbeat intervals must be greater than zero".to_string(),
            ));
        }

        let (transport, diagnostics): (Arc<dyn Transport>, Option<DiagnosticTransport>) =
            if settings.debug {
                let diagnostic = DiagnosticTransport::new();
                (Arc::new(diagnostic.clone()), Some(diagnostic))
            } else {
                let transport = self.transport.ok_or_else(|| {
                    RelayError::Config("a transport is required outside debug mode".to_string())
                })?;
                (transport, None)
            };

        let session = Arc::new(self.session.unwrap_or_default());
        let page = Arc::new(
            self.page
                .unwrap_or_else(|| PageContext::new("", "", default_user_agent())),
        );
        let queue = EventQueue::new().with_warn_threshold(settings.queue_warn_threshold);
        let recorder = Recorder::new(Arc::clone(&session), page, queue.clone());
        let background = TaskTracker::new();

        let geo = self.geo.unwrap_or_else(|| Arc::new(DisabledLookup));
        let resolver = LocationResolver::with_timeout(geo, settings.geo_timeout);
        let batcher = Arc::new(Batcher::new(queue.clone(), Arc::clone(&transport)));
        let heartbeat = Arc::new(HeartbeatScheduler::new(
            recorder.clone(),
            Arc::clone(&batcher),
            background.clone(),
        ));
        let termination = TerminationFlusher::new(
            recorder.clone(),
            queue.clone(),
            Arc::clone(&transport),
            background.clone(),
        );

        debug!(
            session_id = %session.id(),
            transport = transport.name(),
            "Client bootstrapped"
        );

        Ok(PixelClient {
            settings,
            session,
            queue,
            recorder,
            resolver,
            transport,
            diagnostics,
            batcher,
            heartbeat,
            termination,
            background,
            page_views: TaskTracker::new(),
            tasks: Mutex::new(Vec::new()),
            state: Mutex::new(ClientState::Bootstrapping),
            page_view_sent: AtomicBool::new(false),
            scroll: Mutex::new(ScrollDepthTracker::new()),
        })
    }
}

pub struct PixelClient {
    settings: RelaySettings,
    session: Arc<Session>,
    queue: EventQueue,
    recorder: Recorder,
    resolver: LocationResolver,
    transport: Arc<dyn Transport>,
    diagnostics: Option<DiagnosticTransport>,
    batcher: Arc<Batcher>,
    heartbeat: Arc<HeartbeatScheduler>,
    termination: TerminationFlusher,
    background: TaskTracker,
    page_views: TaskTracker,
    tasks: Mutex<Vec<TaskHandle>>,
    state: Mutex<ClientState>,
    page_view_sent: AtomicBool,
    scroll: Mutex<ScrollDepthTracker>,
}

impl PixelClient {
    pub fn builder(settings: RelaySettings) -> PixelClientBuilder {
        PixelClientBuilder {
            settings,
            page: None,
            session: None,
            transport: None,
            geo: None,
        }
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn batcher(&self) -> &Arc<Batcher> {
        &self.batcher
    }

    /// Starts the flush and heartbeat schedules.
    pub fn start(&self) -> Result<(), RelayError> {
        {
            let mut state = self.state.lock();
            if *state != ClientState::Bootstrapping {
                return Err(RelayError::AlreadyStarted);
            }
            *state = ClientState::Active;
        }

        let flush = self.batcher.start(self.settings.batch_interval);
        let heartbeat = self.heartbeat.start(self.settings.heartbeat_interval);
        self.tasks.lock().extend([flush, heartbeat]);

        info!(
            session_id = %self.session.id(),
            transport = self.transport.name(),
            debug = self.settings.debug,
            "Pixel client started"
        );
        Ok(())
    }

    /// Records a custom event. Ignored once termination has begun.
    pub fn track(&self, event_type: impl Into<EventType>, data: EventData) {
        if self.accepts_events() {
            self.recorder.record(event_type.into(), data);
        }
    }

    pub fn track_click(&self, label: &str, element_type: &str, element_text: &str) {
        if self.accepts_events() {
            self.recorder.track_click(label, element_type, element_text);
        }
    }

    pub fn track_scroll(&self, scroll_y: f64, scroll_height: f64, viewport_height: f64) -> Option<u32> {
        if !self.accepts_events() {
            return None;
        }
        self.scroll
            .lock()
            .observe(&self.recorder, scroll_y, scroll_height, viewport_height)
    }

    /// Records the `visit` event, enriched with location. Runs at most once
    /// per session; returns whether this call recorded it.
    pub async fn track_page_view(&self) -> bool {
        if !self.accepts_events() || self.page_view_sent.swap(true, Ordering::SeqCst) {
            return false;
        }

        let location = self.resolver.resolve().await;
        if !self.accepts_events() {
            debug!("Session ended during location lookup, visit dropped");
            return false;
        }

        let page = self.recorder.page();
        let mut data = location.to_event_data();
        if let Some(title) = page.title() {
            data.insert("page_title".to_string(), title.into());
        }
        if let Some(viewport) = page.viewport() {
            data.insert("viewport".to_string(), viewport.into());
        }

        self.recorder.record(EventType::Visit, data);
        info!(city = %location.city, country = %location.country, "Page view recorded");
        true
    }

    /// Runs [`track_page_view`](Self::track_page_view) in the background.
    /// `terminate()` waits for it within the termination budget, so the visit
    /// lands ahead of `session_end`.
    pub fn spawn_page_view(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for page view; call track_page_view directly");
            return;
        };

        let client = Arc::clone(self);
        self.page_views.spawn_on(
            async move {
                client.track_page_view().await;
            },
            &handle,
        );
    }

    pub async fn location(&self) -> LocationInfo {
        self.resolver.resolve().await
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Flushes now, outside the regular schedule.
    pub async fn flush(&self) -> FlushOutcome {
        self.batcher.flush(BatchTrigger::Manual).await
    }

    /// Stops all schedules and waits for them to exit. Queued events are kept
    /// but no longer delivered.
    pub async fn stop(&self) {
        let deadline = Instant::now() + self.settings.termination_budget;
        self.join_tasks(deadline).await;
        self.wait_background(deadline).await;
        self.finish();
    }

    /// Handles the one-shot termination signal: records `session_end`,
    /// pushes out everything queued, then waits up to the termination budget
    /// for outstanding deliveries.
    pub async fn terminate(&self) -> TerminationOutcome {
        if matches!(self.state(), ClientState::Terminating | ClientState::Ended) {
            return TerminationOutcome::AlreadyFired;
        }
        let budget = self.settings.termination_budget;
        let deadline = Instant::now() + budget;

        // A pending page view gets to record its visit first.
        self.page_views.close();
        if timeout_at(deadline, self.page_views.wait()).await.is_err() {
            warn!("Page view still resolving location at termination");
        }

        {
            let mut state = self.state.lock();
            if matches!(*state, ClientState::Terminating | ClientState::Ended) {
                return TerminationOutcome::AlreadyFired;
            }
            *state = ClientState::Terminating;
        }

        for handle in self.tasks.lock().iter() {
            handle.cancel();
        }

        let outcome = self.termination.fire();
        info!(session_id = %self.session.id(), ?outcome, "Termination flush issued");

        // A flush that was mid-send requeues its batch after the drain above
        // if it fails; collect it once every flush has returned.
        self.join_tasks(deadline).await;
        self.wait_background(deadline).await;
        if let Some(late) = self.termination.deliver_remaining() {
            info!(?late, "Late termination batch issued");
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.transport.settle(remaining).await {
            warn!(budget_ms = budget.as_millis() as u64, "Termination deliveries still pending");
        }
        self.wait_background(deadline).await;

        self.finish();
        outcome
    }

    pub fn diagnostics(&self) -> Option<Diagnostics> {
        let delivered = self.diagnostics.as_ref()?;
        Some(Diagnostics {
            session_id: self.session.id().to_string(),
            state: self.state(),
            queued: self.queue.snapshot(),
            queue_metrics: self.queue.metrics(),
            flush_stats: self.batcher.stats(),
            heartbeats: self.heartbeat.beats(),
            delivered_batches: delivered.delivered_count(),
            location: self.resolver.cached().cloned(),
        })
    }

    /// Batches handed to the diagnostic surface (debug mode only).
    pub fn diagnostic_transport(&self) -> Option<&DiagnosticTransport> {
        self.diagnostics.as_ref()
    }

    fn accepts_events(&self) -> bool {
        matches!(
            self.state(),
            ClientState::Bootstrapping | ClientState::Active
        )
    }

    async fn join_tasks(&self, deadline: Instant) {
        let handles = std::mem::take(&mut *self.tasks.lock());
        for handle in &handles {
            handle.cancel();
        }

        let joined = timeout_at(deadline, async move {
            for handle in handles {
                handle.shutdown().await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("Scheduled tick still running at shutdown");
        }
    }

    async fn wait_background(&self, deadline: Instant) {
        self.background.close();
        if timeout_at(deadline, self.background.wait()).await.is_err() {
            warn!("Background flushes still running at shutdown");
        }
    }

    fn finish(&self) {
        *self.state.lock() = ClientState::Ended;
        info!(session_id = %self.session.id(), "Pixel client stopped");
    }
}

impl std::fmt::Debug for PixelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelClient")
            .field("session_id", &self.session.id())
            .field("state", &self.state())
            .field("transport", &self.transport.name())
            .field("queue_len", &self.queue.len())
            .finish()
    }
}

/// `pixel-relay/<version> (<hostname>)`
pub fn default_user_agent() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("pixel-relay/{} ({host})", env!("CARGO_PKG_VERSION"))
}

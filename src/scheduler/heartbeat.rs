use super::flush::Batcher;
use super::task::{TaskHandle, spawn_interval};
use crate::buffer::BatchTrigger;
use crate::tracker::Recorder;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Appends a liveness event on its own schedule and kicks an out-of-band
/// flush after each one.
///
/// The flush is spawned rather than awaited, so a slow collector never delays
/// the next heartbeat.
pub struct HeartbeatScheduler {
    recorder: Recorder,
    batcher: Arc<Batcher>,
    background: TaskTracker,
    beats: AtomicU64,
}

impl HeartbeatScheduler {
    pub fn new(recorder: Recorder, batcher: Arc<Batcher>, background: TaskTracker) -> Self {
        Self {
            recorder,
            batcher,
            background,
            beats: AtomicU64::new(0),
        }
    }

    pub fn beat(&self) {
        self.recorder.track_heartbeat();
        let beats = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(beats, "Heartbeat recorded");

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for heartbeat flush; events wait for the next tick");
            return;
        };

        let batcher = Arc::clone(&self.batcher);
        self.background.spawn_on(
            async move {
                batcher.flush(BatchTrigger::Heartbeat).await;
            },
            &handle,
        );
    }

    pub fn start(self: &Arc<Self>, interval: Duration) -> TaskHandle {
        info!(interval_ms = interval.as_millis() as u64, "Starting heartbeat schedule");
        let scheduler = Arc::clone(self);
        spawn_interval("heartbeat", interval, move || {
            scheduler.beat();
            std::future::ready(())
        })
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("beats", &self.beats())
            .finish()
    }
}

use crate::buffer::{Batch, BatchTrigger, EventQueue};
use crate::sender::Transport;
use crate::tracker::Recorder;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// How the final batch left the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Accepted by the termination-safe primitive.
    Beacon { events: usize },
    /// No beacon available; an ordinary send was started and not awaited.
    FallbackSend { events: usize },
    /// No way to deliver at all (no runtime to run the fallback on).
    Abandoned { events: usize },
    AlreadyFired,
}

/// Reacts to the one-shot termination signal.
///
/// Appends `session_end`, drains everything still queued and pushes it out
/// through the transport's beacon. Never suspends, so it can run from a
/// shutdown hook with an unknown completion budget.
pub struct TerminationFlusher {
    recorder: Recorder,
    queue: EventQueue,
    transport: Arc<dyn Transport>,
    background: TaskTracker,
    fired: AtomicBool,
}

impl TerminationFlusher {
    pub fn new(
        recorder: Recorder,
        queue: EventQueue,
        transport: Arc<dyn Transport>,
        background: TaskTracker,
    ) -> Self {
        Self {
            recorder,
            queue,
            transport,
            background,
            fired: AtomicBool::new(false),
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn fire(&self) -> TerminationOutcome {
        if self.fired.swap(true, Ordering::SeqCst) {
            return TerminationOutcome::AlreadyFired;
        }

        self.recorder.track_session_end();
        self.dispatch(Batch::new(self.queue.drain(), BatchTrigger::Termination))
    }

    /// Pushes out events that reached the queue after [`fire`](Self::fire),
    /// such as a scheduled batch that failed mid-send and was requeued.
    /// Returns `None` when nothing was left or the flusher has not fired.
    pub fn deliver_remaining(&self) -> Option<TerminationOutcome> {
        if !self.has_fired() {
            return None;
        }

        let events = self.queue.drain();
        if events.is_empty() {
            return None;
        }
        info!(events = events.len(), "Delivering events requeued after termination flush");
        Some(self.dispatch(Batch::new(events, BatchTrigger::Termination)))
    }

    fn dispatch(&self, batch: Batch) -> TerminationOutcome {
        let events = batch.size();

        match self.transport.beacon(batch.clone()) {
            Ok(()) => {
                info!(batch_id = %batch.id(), events, "Termination batch handed to beacon");
                return TerminationOutcome::Beacon { events };
            }
            Err(e) => {
                warn!(error = %e, "Beacon unavailable, falling back to ordinary send");
            }
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(events, "No runtime available for termination send; batch abandoned");
            return TerminationOutcome::Abandoned { events };
        };

        let transport = Arc::clone(&self.transport);
        self.background.spawn_on(
            async move {
                if let Err(e) = transport.send(&batch).await {
                    warn!(batch_id = %batch.id(), error = %e, "Termination send failed");
                }
            },
            &handle,
        );
        TerminationOutcome::FallbackSend { events }
    }
}

impl std::fmt::Debug for TerminationFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminationFlusher")
            .field("fired", &self.has_fired())
            .field("transport", &self.transport.name())
            .finish()
    }
}

//! Typed entry points used by behavioral probes.
//!
//! Probes never touch the queue directly; they go through a [`Recorder`],
//! which stamps session and page context onto every event.

use crate::buffer::EventQueue;
use crate::domain::{Event, EventData, EventType, PageContext, Session};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const ELEMENT_TEXT_LIMIT: usize = 50;
const SCROLL_MILESTONES: [u32; 5] = [25, 50, 75, 90, 100];

#[derive(Debug, Clone)]
pub struct Recorder {
    session: Arc<Session>,
    page: Arc<PageContext>,
    queue: EventQueue,
}

impl Recorder {
    pub fn new(session: Arc<Session>, page: Arc<PageContext>, queue: EventQueue) -> Self {
        Self {
            session,
            page,
            queue,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn build(&self, event_type: EventType, data: EventData) -> Event {
        Event::new(
            event_type,
            data,
            self.page.url(),
            self.page.referrer(),
            self.session.id(),
            self.page.user_agent(),
        )
    }

    pub fn record(&self, event_type: EventType, data: EventData) {
        let event = self.build(event_type, data);
        debug!(event_type = %event.event_type(), "Enqueued event");
        self.queue.enqueue(event);
    }

    pub fn track_click(&self, label: &str, element_type: &str, element_text: &str) {
        let text: String = element_text.trim().chars().take(ELEMENT_TEXT_LIMIT).collect();
        self.record(
            EventType::Click,
            object(json!({
                "label": label,
                "element_type": element_type.to_lowercase(),
                "element_text": text,
            })),
        );
    }

    pub fn track_heartbeat(&self) {
        let elapsed = self.session.elapsed();
        self.record(
            EventType::Heartbeat,
            object(json!({
                "uptime": elapsed.as_millis() as u64,
                "active_time": self.session.elapsed_secs_rounded(),
            })),
        );
    }

    pub fn track_session_end(&self) {
        self.record(
            EventType::SessionEnd,
            object(json!({
                "duration": self.session.elapsed_secs_rounded(),
                "final_url": self.page.url(),
            })),
        );
    }
}

/// Reports the furthest scroll position, but only at fixed milestones.
#[derive(Debug, Default)]
pub struct ScrollDepthTracker {
    max_depth: u32,
}

impl ScrollDepthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the milestone that was recorded, if any.
    pub fn observe(
        &mut self,
        recorder: &Recorder,
        scroll_y: f64,
        scroll_height: f64,
        viewport_height: f64,
    ) -> Option<u32> {
        let scrollable = scroll_height - viewport_height;
        if scrollable <= 0.0 {
            return None;
        }

        let depth = ((scroll_y / scrollable) * 100.0).round();
        if !depth.is_finite() || depth < 0.0 {
            return None;
        }
        let depth = depth as u32;

        if depth <= self.max_depth {
            return None;
        }
        self.max_depth = depth;

        if SCROLL_MILESTONES.contains(&depth) {
            recorder.record(EventType::Scroll, object(json!({ "depth": depth })));
            Some(depth)
        } else {
            None
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

fn object(value: serde_json::Value) -> EventData {
    match value {
        serde_json::Value::Object(map) => map,
        _ => EventData::new(),
    }
}

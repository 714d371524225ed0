use crate::domain::Event;
use serde::Serialize;
use uuid::Uuid;

/// Why a batch was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchTrigger {
    /// Regular flush tick.
    Scheduled,
    /// Out-of-band flush following a heartbeat.
    Heartbeat,
    /// Final delivery on termination.
    Termination,
    /// Explicit `flush()` from the host.
    Manual,
}

/// Full contents of the queue drained together for one delivery attempt.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    events: Vec<Event>,
    trigger: BatchTrigger,
}

/// Wire shape accepted by the collector: `{ "batch": [Event, ...] }`.
#[derive(Serialize)]
pub struct BatchPayload<'a> {
    pub batch: &'a [Event],
}

impl BatchTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchTrigger::Scheduled => "scheduled",
            BatchTrigger::Heartbeat => "heartbeat",
            BatchTrigger::Termination => "termination",
            BatchTrigger::Manual => "manual",
        }
    }
}

impl Batch {
    pub fn new(events: Vec<Event>, trigger: BatchTrigger) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            events,
            trigger,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn trigger(&self) -> BatchTrigger {
        self.trigger
    }

    pub fn payload(&self) -> BatchPayload<'_> {
        BatchPayload {
            batch: &self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_names_match_serde() {
        for trigger in [
            BatchTrigger::Scheduled,
            BatchTrigger::Heartbeat,
            BatchTrigger::Termination,
            BatchTrigger::Manual,
        ] {
            assert_eq!(serde_json::to_value(trigger).unwrap(), trigger.as_str());
        }
    }

    #[test]
    fn test_payload_wraps_events() {
        let batch = Batch::new(Vec::new(), BatchTrigger::Manual);
        let value = serde_json::to_value(batch.payload()).unwrap();

        assert_eq!(value, serde_json::json!({ "batch": [] }));
        assert!(batch.is_empty());
    }
}

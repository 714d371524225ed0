use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form event payload. Values are kept as raw JSON; no schema is applied.
pub type EventData = serde_json::Map<String, serde_json::Value>;

/// Kind of a recorded occurrence.
///
/// Well-known kinds serialize as snake_case strings; anything else round-trips
/// through `Custom` unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Visit,
    Click,
    Scroll,
    Heartbeat,
    SessionEnd,
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Visit => "visit",
            EventType::Click => "click",
            EventType::Scroll => "scroll",
            EventType::Heartbeat => "heartbeat",
            EventType::SessionEnd => "session_end",
            EventType::Custom(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "visit" => EventType::Visit,
            "click" => EventType::Click,
            "scroll" => EventType::Scroll,
            "heartbeat" => EventType::Heartbeat,
            "session_end" => EventType::SessionEnd,
            _ => EventType::Custom(value),
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        match value {
            EventType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded occurrence together with the session context it was observed in.
///
/// Events are immutable once built; the queue and the transports only ever move
/// or clone them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    data: EventData,
    url: String,
    referrer: String,
    timestamp: String,
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "userAgent")]
    user_agent: String,
}

impl Event {
    pub fn new(
        event_type: EventType,
        data: EventData,
        url: impl Into<String>,
        referrer: impl Into<String>,
        session_id: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self::at(
            Utc::now(),
            event_type,
            data,
            url,
            referrer,
            session_id,
            user_agent,
        )
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        event_type: EventType,
        data: EventData,
        url: impl Into<String>,
        referrer: impl Into<String>,
        session_id: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            data,
            url: url.into(),
            referrer: referrer.into(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id: session_id.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(String::from(EventType::SessionEnd), "session_end");
        assert_eq!(EventType::from("heartbeat"), EventType::Heartbeat);
        assert_eq!(
            EventType::from("signup"),
            EventType::Custom("signup".to_string())
        );
    }

    #[test]
    fn test_event_serializes_with_collector_field_names() {
        let mut data = EventData::new();
        data.insert("label".to_string(), json!("cta"));
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

        let event = Event::at(
            ts,
            EventType::Click,
            data,
            "https://example.com/",
            "",
            "123-abcdef",
            "test-agent",
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "click");
        assert_eq!(value["data"]["label"], "cta");
        assert_eq!(value["sessionId"], "123-abcdef");
        assert_eq!(value["userAgent"], "test-agent");
        assert_eq!(value["timestamp"], "2026-01-02T03:04:05.000Z");
    }
}

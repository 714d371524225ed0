use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

const SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identity and start instant of one client lifetime.
///
/// Created once at bootstrap and never mutated. `start_time` is taken from the
/// tokio clock so elapsed values follow a paused clock in tests.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    start_time: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: generate_session_id(),
            start_time: Instant::now(),
        }
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            start_time: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Elapsed seconds, rounded to the nearest whole second.
    pub fn elapsed_secs_rounded(&self) -> u64 {
        (self.elapsed().as_millis() as u64 + 500) / 1000
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// `<unix-millis>-<six base36 chars>`
pub fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();

    format!("{millis}-{suffix}")
}

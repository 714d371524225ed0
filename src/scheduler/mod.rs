pub mod flush;
pub mod heartbeat;
pub mod task;
pub mod termination;

pub use flush::{Batcher, DEFAULT_BATCH_INTERVAL, FlushOutcome, FlushStats};
pub use heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, HeartbeatScheduler};
pub use task::{TaskHandle, spawn_interval};
pub use termination::{TerminationFlusher, TerminationOutcome};

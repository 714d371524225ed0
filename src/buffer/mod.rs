pub mod batch;
pub mod metrics;
pub mod queue;

pub use batch::{Batch, BatchPayload, BatchTrigger};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::EventQueue;

//! rt-engine: Multi-host log aggregation
//!
//! One [`TailExecutor`] per (host, file) follows the file over a remote
//! shell and pushes each line into a single bounded channel. The
//! [`Aggregator`] drains that channel, renders every line for the operator
//! and forwards it to the configured sink. The [`Orchestrator`] launches
//! and supervises the executors so one host's failure never stops another.

pub mod aggregator;
pub mod executor;
pub mod orchestrator;
pub mod output;
pub mod transform;

pub use aggregator::{
    Aggregator, AggregatorStats, Publisher, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SINK_QUEUE_CAPACITY,
};
pub use executor::{TailExecutor, TailReport};
pub use orchestrator::{Orchestrator, RunSummary, TaskOutcome, TaskResult};
pub use output::{ConsoleOutput, OperatorOutput};
pub use transform::LineStyle;

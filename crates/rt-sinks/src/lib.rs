//! rt-sinks: Pluggable destinations for aggregated log lines
//!
//! Drivers are registered by name on a [`SinkRegistry`] built once at
//! startup and then only read. The built-in drivers are:
//!
//! - `kafka_rest`: publishes to a Kafka REST proxy
//! - `jsonl`: appends newline-delimited JSON to a local file

mod jsonl;
mod kafka_rest;
mod record;
mod registry;

pub use jsonl::JsonlSink;
pub use kafka_rest::KafkaRestSink;
pub use record::SinkRecord;
pub use registry::{SinkFactory, SinkRegistry};

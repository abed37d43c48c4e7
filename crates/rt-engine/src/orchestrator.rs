//! Launches and supervises one executor per (host, file)
//!
//! Each executor runs as its own task. Errors and panics are caught at the
//! task boundary and reported host-tagged to the operator as soon as that
//! task ends, while sibling tasks keep running. The run ends once every
//! executor has finished and the aggregator has drained.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use rt_core::traits::{Connector, Sink};
use rt_core::{ServerTarget, TailError};

use crate::aggregator::{Aggregator, AggregatorStats, DEFAULT_CHANNEL_CAPACITY};
use crate::executor::{TailExecutor, TailReport};
use crate::output::OperatorOutput;

/// Terminal state of one executor task
#[derive(Debug)]
pub enum TaskOutcome {
    /// The remote command exited cleanly and both streams drained
    Completed(TailReport),
    /// The task ended with a host-scoped error
    Failed(TailError),
    /// The task panicked
    Panicked(String),
}

impl TaskOutcome {
    /// Whether the remote command exited cleanly
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }
}

/// Outcome of one (host, path) task
#[derive(Debug)]
pub struct TaskResult {
    pub host: String,
    pub path: String,
    pub outcome: TaskOutcome,
}

/// Everything that happened during a run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One entry per launched executor, in launch order
    pub tasks: Vec<TaskResult>,
    /// Consumer counters
    pub aggregator: AggregatorStats,
}

impl RunSummary {
    /// Tasks that ended in an error or a panic; cancelled tasks are not counted
    pub fn failed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| match &t.outcome {
                TaskOutcome::Completed(_) => false,
                TaskOutcome::Failed(e) => !e.is_cancelled(),
                TaskOutcome::Panicked(_) => true,
            })
            .count()
    }

    /// Tasks stopped by cancellation
    pub fn cancelled(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(&t.outcome, TaskOutcome::Failed(e) if e.is_cancelled()))
            .count()
    }
}

/// Supervises every tail task of the process
pub struct Orchestrator {
    targets: Vec<Arc<ServerTarget>>,
    connector: Arc<dyn Connector>,
    output: Arc<dyn OperatorOutput>,
    sink: Option<Arc<dyn Sink>>,
    sink_timeout: Duration,
    channel_capacity: usize,
}

impl Orchestrator {
    /// Orchestrator for `targets`, connecting through `connector`
    pub fn new(
        targets: Vec<ServerTarget>,
        connector: Arc<dyn Connector>,
        output: Arc<dyn OperatorOutput>,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            connector,
            output,
            sink: None,
            sink_timeout: Duration::from_secs(5),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Forward every line to `sink`
    pub fn with_sink(mut self, sink: Option<Arc<dyn Sink>>, timeout: Duration) -> Self {
        self.sink = sink;
        self.sink_timeout = timeout;
        self
    }

    /// Override the aggregator channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Run every task to completion.
    ///
    /// Cancelling `cancel` stops all executors; their sessions are closed and
    /// the aggregator drains whatever was already queued.
    pub async fn run(mut self, cancel: CancellationToken) -> RunSummary {
        if self.targets.is_empty() {
            self.output.error("No target host is available");
            return RunSummary::default();
        }

        let (publisher, aggregator) =
            Aggregator::channel(self.channel_capacity, Arc::clone(&self.output));
        let consumer = tokio::spawn(aggregator.with_sink(self.sink.take(), self.sink_timeout).run());

        // Tasks are settled in completion order; results keep launch order
        let mut pending = FuturesUnordered::new();
        let mut slots: Vec<Option<TaskResult>> = Vec::new();
        for target in &self.targets {
            for path in &target.file_paths {
                let executor = TailExecutor::new(Arc::clone(target), path.clone());
                let host = executor.host().to_string();
                tracing::info!(host = %host, path = %path, "Starting tail");

                let connector = Arc::clone(&self.connector);
                let publisher = publisher.clone();
                let cancel = cancel.clone();
                let handle = tokio::spawn(async move {
                    executor.run(connector.as_ref(), publisher, cancel).await
                });

                let slot = slots.len();
                slots.push(None);
                let path = path.clone();
                pending.push(async move { (slot, host, path, handle.await) });
            }
        }
        // The consumer stops once the last executor's publisher is gone
        drop(publisher);

        while let Some((slot, host, path, joined)) = pending.next().await {
            let outcome = self.settle(&host, &path, joined);
            slots[slot] = Some(TaskResult {
                host,
                path,
                outcome,
            });
        }

        let mut summary = RunSummary {
            tasks: slots.into_iter().flatten().collect(),
            ..Default::default()
        };

        summary.aggregator = consumer.await.unwrap_or_else(|e| {
            tracing::error!("Aggregator task failed: {}", e);
            AggregatorStats::default()
        });

        tracing::info!(
            tasks = summary.tasks.len(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            rendered = summary.aggregator.rendered,
            "All tail tasks finished"
        );
        summary
    }
}

impl Orchestrator {
    /// Turn a finished task into its outcome, reporting failures right away
    fn settle(
        &self,
        host: &str,
        path: &str,
        joined: Result<Result<TailReport, TailError>, JoinError>,
    ) -> TaskOutcome {
        match joined {
            Ok(Ok(report)) => TaskOutcome::Completed(report),
            Ok(Err(e)) if e.is_cancelled() => {
                tracing::debug!(host = %host, path = %path, "Tail cancelled");
                TaskOutcome::Failed(e)
            }
            Ok(Err(e)) => {
                tracing::error!(host = %host, path = %path, "Tail failed: {}", e);
                self.output.error(&e.to_string());
                TaskOutcome::Failed(e)
            }
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                tracing::error!(host = %host, path = %path, "Tail task panicked: {}", reason);
                self.output
                    .error(&format!("[{}] task panicked: {}", host, reason));
                TaskOutcome::Panicked(reason)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

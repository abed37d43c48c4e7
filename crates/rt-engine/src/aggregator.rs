//! Fan-in of every executor's lines into one consumer
//!
//! All executors share one bounded channel. A full channel blocks every
//! producer equally, which pushes back through the line readers to the
//! remote `tail` processes. The sink is fed from its own queue and task, so
//! rendering never waits on sink I/O; when that queue is full the line is
//! dropped for the sink and counted as a sink failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rt_core::traits::Sink;
use rt_core::Message;

use crate::output::OperatorOutput;

/// Channel capacity shared by all executors.
///
/// Large enough to absorb short bursts from many hosts, small enough that
/// a stalled consumer does not buffer unbounded output.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 255;

/// Lines waiting for the sink before new ones are dropped
pub const DEFAULT_SINK_QUEUE_CAPACITY: usize = 1024;

/// Default bound on one sink publish
const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer side of the aggregator channel
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Message>,
}

impl Publisher {
    /// Enqueue `message`, waiting while the channel is full.
    ///
    /// Fails (returning the message) only once the consumer is gone.
    pub async fn publish(&self, message: Message) -> Result<(), Message> {
        self.tx.send(message).await.map_err(|e| e.0)
    }
}

/// Counters reported when the consumer loop ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Messages shown to the operator
    pub rendered: u64,
    /// Messages accepted by the sink
    pub forwarded: u64,
    /// Messages the sink never accepted: failed, timed out or dropped
    pub sink_failures: u64,
    /// Messages dropped because the sink queue was full (part of `sink_failures`)
    pub sink_dropped: u64,
}

/// The single consumer of the aggregator channel
pub struct Aggregator {
    rx: mpsc::Receiver<Message>,
    output: Arc<dyn OperatorOutput>,
    sink: Option<Arc<dyn Sink>>,
    sink_timeout: Duration,
    sink_queue: usize,
}

impl Aggregator {
    /// Create the channel and its consumer
    pub fn channel(capacity: usize, output: Arc<dyn OperatorOutput>) -> (Publisher, Aggregator) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let aggregator = Aggregator {
            rx,
            output,
            sink: None,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            sink_queue: DEFAULT_SINK_QUEUE_CAPACITY,
        };
        (Publisher { tx }, aggregator)
    }

    /// Forward messages to `sink`, bounding each publish by `timeout`
    pub fn with_sink(mut self, sink: Option<Arc<dyn Sink>>, timeout: Duration) -> Self {
        self.sink = sink;
        self.sink_timeout = timeout;
        self
    }

    /// Override how many lines may wait for the sink
    pub fn with_sink_queue(mut self, capacity: usize) -> Self {
        self.sink_queue = capacity;
        self
    }

    /// Drain the channel until every publisher is dropped, then flush and
    /// close the sink
    pub async fn run(mut self) -> AggregatorStats {
        let mut stats = AggregatorStats::default();
        let mut forwarder = self
            .sink
            .take()
            .map(|sink| SinkForwarder::spawn(sink, self.sink_timeout, self.sink_queue));

        while let Some(message) = self.rx.recv().await {
            self.output.message(&message);
            stats.rendered += 1;

            if let Some(forwarder) = forwarder.as_mut() {
                if !message.is_blank() && !forwarder.offer(message) {
                    stats.sink_dropped += 1;
                }
            }
        }

        if let Some(forwarder) = forwarder {
            let counts = forwarder.finish().await;
            stats.forwarded = counts.forwarded;
            stats.sink_failures = counts.failures + stats.sink_dropped;
        }

        tracing::debug!(?stats, "Aggregator drained");
        stats
    }
}

#[derive(Debug, Default)]
struct SinkCounts {
    forwarded: u64,
    failures: u64,
}

/// Queue plus task that hands messages to the sink one at a time
struct SinkForwarder {
    tx: mpsc::Sender<Message>,
    task: JoinHandle<SinkCounts>,
    /// Set while the queue is overflowing, so the drop is logged once per burst
    overflowing: bool,
}

impl SinkForwarder {
    fn spawn(sink: Arc<dyn Sink>, timeout: Duration, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            task: tokio::spawn(forward(sink, rx, timeout)),
            overflowing: false,
        }
    }

    /// Queue `message` without waiting; false when it was dropped
    fn offer(&mut self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => {
                self.overflowing = false;
                true
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                if !self.overflowing {
                    tracing::warn!(host = %message.host(), "Sink queue full, dropping lines for the sink");
                    self.overflowing = true;
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Let the queue drain and wait for the sink to close
    async fn finish(self) -> SinkCounts {
        drop(self.tx);
        self.task.await.unwrap_or_else(|e| {
            tracing::error!("Sink forwarder failed: {}", e);
            SinkCounts::default()
        })
    }
}

async fn forward(
    sink: Arc<dyn Sink>,
    mut rx: mpsc::Receiver<Message>,
    timeout: Duration,
) -> SinkCounts {
    let mut counts = SinkCounts::default();

    while let Some(message) = rx.recv().await {
        match tokio::time::timeout(timeout, sink.publish(&message)).await {
            Ok(Ok(())) => counts.forwarded += 1,
            Ok(Err(e)) => {
                counts.failures += 1;
                tracing::warn!(host = %message.host(), "Sink publish failed: {}", e);
            }
            Err(_) => {
                counts.failures += 1;
                tracing::warn!(
                    host = %message.host(),
                    "Sink publish timed out after {:?}",
                    timeout
                );
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::warn!("Failed to close sink: {}", e);
    }
    counts
}

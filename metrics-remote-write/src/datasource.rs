use std::fmt;
use std::sync::Arc;
use std::thread;

use tokio::runtime;
use tokio::sync::mpsc;
use tracing::info;

use crate::common::{BuildError, RemoteWriteError};
use crate::config::DatasourceConfig;
use crate::convert::convert;
use crate::point::MetricPoint;
use crate::queue::{Batch, Consumer};
use crate::sender::Sender;
use crate::target::{targets_from_config, RemoteTarget};

/// Entry point for writing metric points to remote write endpoints.
///
/// A `Datasource` converts points on the calling side, then hands them to a bounded queue drained by a single
/// background consumer, which encodes each batch and delivers it to every target. Writing returns as soon as
/// the batch is queued; delivery failures are reported to the configured
/// [`DeliveryObserver`][crate::DeliveryObserver] and never reach the caller.
///
/// Delivery is best-effort: batches still queued or in flight when the process exits are lost.
///
/// Cloning a `Datasource` is cheap, and all clones feed the same queue. Once the last clone is dropped, the
/// consumer drains what is left in the queue and stops. If [`init`][Datasource::init] was called outside of
/// a Tokio runtime, the runtime it created is shut down at that point, which aborts any delivery still in
/// flight without reporting it to the observer.
#[derive(Clone)]
pub struct Datasource {
    queue: mpsc::Sender<Batch>,
    targets: Arc<[RemoteTarget]>,
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("targets", &self.targets)
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

impl Datasource {
    /// Initializes the datasource and starts its background consumer.
    ///
    /// When called from within a Tokio runtime, the consumer is spawned directly into the runtime. Otherwise,
    /// a new single-threaded Tokio runtime is created on a background thread, and the consumer is spawned
    /// there.
    ///
    /// ## Errors
    ///
    /// Endpoints that cannot be parsed are logged and skipped. If no endpoint remains, or if the runtime for
    /// the consumer cannot be created, an error variant will be returned and no consumer is started.
    pub fn init(config: &DatasourceConfig) -> Result<Self, BuildError> {
        let datasource = if let Ok(handle) = runtime::Handle::try_current() {
            let (datasource, consumer) = {
                let _g = handle.enter();
                Self::build(config)?
            };

            handle.spawn(consumer.run());

            datasource
        } else {
            let runtime = runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            let (datasource, consumer) = {
                let _g = runtime.enter();
                Self::build(config)?
            };

            thread::Builder::new()
                .name("metrics-remote-write-dispatcher".to_string())
                .spawn(move || runtime.block_on(consumer.run()))
                .map_err(|e| BuildError::FailedToCreateRuntime(e.to_string()))?;

            datasource
        };

        info!(
            remote_write_num = datasource.targets.len(),
            "Successfully initialized remote write datasource."
        );

        Ok(datasource)
    }

    /// Builds the datasource and the consumer for its queue, without starting the consumer.
    pub(crate) fn build(config: &DatasourceConfig) -> Result<(Self, Consumer), BuildError> {
        let targets = targets_from_config(&config.remote_write)?;
        let sender = Sender::new(targets, &config.user_agent, config.retry);
        let targets = sender.targets().into();

        let (queue, batches) = mpsc::channel(config.queue_capacity);
        let consumer =
            Consumer::new(batches, sender, Arc::clone(&config.observer), config.max_in_flight);

        Ok((Self { queue, targets }, consumer))
    }

    /// Targets that points are delivered to.
    pub fn targets(&self) -> &[RemoteTarget] {
        &self.targets
    }

    /// Number of batches waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }

    /// Converts the points and queues them for delivery.
    ///
    /// Waits for space if the queue is full. An empty batch is ignored.
    ///
    /// ## Errors
    ///
    /// If any point has an invalid metric name, nothing is queued and an error variant is returned. An error
    /// is also returned if the consumer is no longer running.
    pub async fn remote_write(&self, points: &[MetricPoint]) -> Result<(), RemoteWriteError> {
        if points.is_empty() {
            return Ok(());
        }

        let batch = convert(points)?;
        self.queue.send(batch).await.map_err(|_| RemoteWriteError::QueueClosed)
    }

    /// Converts the points and queues them for delivery, blocking the current thread.
    ///
    /// Behaves like [`remote_write`][Datasource::remote_write], for callers outside of an async context.
    ///
    /// ## Errors
    ///
    /// Same as [`remote_write`][Datasource::remote_write].
    ///
    /// ## Panics
    ///
    /// This method panics if called from within an asynchronous execution context.
    pub fn blocking_remote_write(&self, points: &[MetricPoint]) -> Result<(), RemoteWriteError> {
        if points.is_empty() {
            return Ok(());
        }

        let batch = convert(points)?;
        self.queue.blocking_send(batch).map_err(|_| RemoteWriteError::QueueClosed)
    }
}

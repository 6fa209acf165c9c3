use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error};

use crate::common::EncodeError;
use crate::observer::DeliveryObserver;
use crate::remote_write_proto::{encode, TimeSeries};
use crate::sender::Sender;

pub(crate) type Batch = Vec<TimeSeries>;

type Encoder = fn(Batch) -> Result<Bytes, EncodeError>;

/// Drains the dispatch queue, encoding each batch and fanning it out to every target.
///
/// Deliveries are not awaited: the next batch is taken off the queue as soon as the previous one has been
/// launched. Outstanding deliveries across all batches are capped by a semaphore holding one permit per
/// (batch, target) pair.
pub(crate) struct Consumer {
    batches: mpsc::Receiver<Batch>,
    sender: Sender,
    observer: Arc<dyn DeliveryObserver>,
    in_flight: Arc<Semaphore>,
    encoder: Encoder,
}

impl Consumer {
    pub(crate) fn new(
        batches: mpsc::Receiver<Batch>,
        sender: Sender,
        observer: Arc<dyn DeliveryObserver>,
        max_in_flight: usize,
    ) -> Self {
        // A single batch must always fit, or the consumer would wait forever.
        let permits = max_in_flight.max(sender.targets().len()).min(Semaphore::MAX_PERMITS);

        Self { batches, sender, observer, in_flight: Arc::new(Semaphore::new(permits)), encoder: encode }
    }

    #[cfg(test)]
    fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub(crate) async fn run(mut self) {
        while let Some(batch) = self.batches.recv().await {
            let series = batch.len();
            let payload = match (self.encoder)(batch) {
                Ok(payload) => payload,
                Err(e) => {
                    self.observer.on_encode_failure(&e, series);
                    continue;
                }
            };
            self.observer.on_encoded(series, payload.len());

            self.launch(payload).await;
        }

        debug!("Dispatch queue closed. Consumer stopping.");
    }

    async fn launch(&self, payload: Bytes) {
        let permits = u32::try_from(self.sender.targets().len()).unwrap_or(u32::MAX);
        let permit = match Arc::clone(&self.in_flight).acquire_many_owned(permits).await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "In-flight limiter closed. Dropping batch.");
                return;
            }
        };

        let mut deliveries = self.sender.launch(payload);
        let observer = Arc::clone(&self.observer);
        tokio::spawn(async move {
            let _permit = permit;
            while let Some(joined) = deliveries.join_next().await {
                match joined {
                    Ok(report) => observer.on_delivery(&report),
                    Err(e) => error!(error = %e, "Remote write delivery task failed."),
                }
            }
        });
    }
}

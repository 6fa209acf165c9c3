use metrics::{counter, histogram};
use tracing::{error, info};

use crate::common::EncodeError;
use crate::delivery::DeliveryReport;

/// Receives the outcome of work done by the dispatch queue consumer.
///
/// Observers are called from the consumer and from delivery tasks, so they should not block.
pub trait DeliveryObserver: Send + Sync + 'static {
    /// Called when a batch has been encoded and is about to be delivered.
    fn on_encoded(&self, _series: usize, _payload_len: usize) {}

    /// Called when a batch could not be encoded and was dropped.
    fn on_encode_failure(&self, error: &EncodeError, series: usize);

    /// Called once per target when a delivery finishes, successfully or not.
    fn on_delivery(&self, report: &DeliveryReport);
}

/// Observer that logs through `tracing` and records telemetry through `metrics`.
///
/// Successful deliveries are logged at `INFO`, and failures at `ERROR`. The following metrics are recorded
/// against whichever recorder is installed:
///
/// - `remote_write_batches_encoded_total` (counter)
/// - `remote_write_payload_bytes` (histogram)
/// - `remote_write_encode_failures_total` (counter)
/// - `remote_write_deliveries_total`, labeled by `target` and `outcome` (counter)
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_encoded(&self, _series: usize, payload_len: usize) {
        counter!("remote_write_batches_encoded_total").increment(1);
        histogram!("remote_write_payload_bytes").record(payload_len as f64);
    }

    fn on_encode_failure(&self, error: &EncodeError, series: usize) {
        counter!("remote_write_encode_failures_total").increment(1);
        error!(%error, series, "Failed to encode write request. Dropping batch.");
    }

    fn on_delivery(&self, report: &DeliveryReport) {
        let outcome = report.outcome();
        counter!(
            "remote_write_deliveries_total",
            "target" => report.target.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        match &report.result {
            Ok(()) => info!(
                target_name = %report.target,
                endpoint = %report.endpoint,
                attempts = report.attempts,
                elapsed = ?report.elapsed,
                "Delivered payload to remote write endpoint."
            ),
            Err(e) => error!(
                target_name = %report.target,
                endpoint = %report.endpoint,
                attempts = report.attempts,
                recoverable = e.is_recoverable(),
                error = %e,
                "Failed to deliver payload to remote write endpoint."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hyper::{StatusCode, Uri};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::{DeliveryObserver, TracingObserver};
    use crate::delivery::{DeliveryError, DeliveryReport};

    fn report(target: &str, result: Result<(), DeliveryError>) -> DeliveryReport {
        DeliveryReport {
            target: target.to_string(),
            endpoint: "http://127.0.0.1:9090/api/v1/write".parse::<Uri>().unwrap(),
            attempts: 1,
            elapsed: Duration::from_millis(12),
            result,
        }
    }

    #[test]
    fn test_deliveries_are_counted_per_outcome() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let observer = TracingObserver;
            observer.on_delivery(&report("primary", Ok(())));
            observer.on_delivery(&report("primary", Ok(())));
            observer.on_delivery(&report(
                "secondary",
                Err(DeliveryError::ServerError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: "overloaded".to_string(),
                }),
            ));
        });

        let mut deliveries = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, ..)| key.key().name() == "remote_write_deliveries_total")
            .map(|(key, _, _, value)| {
                let labels = key
                    .key()
                    .labels()
                    .map(|l| format!("{}={}", l.key(), l.value()))
                    .collect::<Vec<_>>()
                    .join(",");
                let count = match value {
                    DebugValue::Counter(count) => count,
                    other => panic!("unexpected value: {other:?}"),
                };
                (labels, count)
            })
            .collect::<Vec<_>>();
        deliveries.sort();

        assert_eq!(
            deliveries,
            vec![
                ("target=primary,outcome=success".to_string(), 2),
                ("target=secondary,outcome=recoverable".to_string(), 1),
            ]
        );
    }
}

use tracing::debug;

use crate::common::ConvertError;
use crate::point::{is_valid_label_name, is_valid_metric_name, MetricPoint};
use crate::remote_write_proto::{Label, Sample, TimeSeries, LABEL_NAME};

/// Converts a batch of metric points into remote write time series.
///
/// Each point becomes one series with a single sample, and the output is in the same order as the input.
/// Tags with invalid label names are dropped from their series.
///
/// ## Errors
///
/// If any point has an invalid metric name, the whole batch is rejected and no series are returned.
pub fn convert(points: &[MetricPoint]) -> Result<Vec<TimeSeries>, ConvertError> {
    points.iter().map(convert_one).collect()
}

fn convert_one(point: &MetricPoint) -> Result<TimeSeries, ConvertError> {
    if !is_valid_metric_name(&point.metric) {
        return Err(ConvertError::InvalidMetricName { name: point.metric.clone() });
    }

    let mut labels = Vec::with_capacity(point.tags.len() + 1);
    labels.push(Label::new(LABEL_NAME, point.metric.as_str()));

    for (key, value) in &point.tags {
        // `__name__` is a valid label name, but it belongs to the metric.
        if is_valid_label_name(key) && key != LABEL_NAME {
            labels.push(Label::new(key.as_str(), value.as_str()));
        } else {
            debug!(metric = %point.metric, tag = %key, "Dropping tag with invalid label name.");
        }
    }

    let mut series = TimeSeries {
        labels,
        samples: vec![Sample { value: point.value, timestamp: seconds_to_millis(point.time) }],
    };
    series.sort_labels_and_samples();

    Ok(series)
}

fn seconds_to_millis(seconds: i64) -> i64 {
    seconds.saturating_mul(1000)
}

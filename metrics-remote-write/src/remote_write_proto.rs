//! Types and utilities for calling Prometheus remote write API endpoints.
use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Method, Request, Uri};
use prost::Message as _;

use crate::common::{DecodeError, EncodeError};

/// Special label for the name of a metric.
pub const LABEL_NAME: &str = "__name__";
/// Content type of a remote write request body.
pub const CONTENT_TYPE: &str = "application/x-protobuf";
/// Content encoding of a remote write request body.
pub const CONTENT_ENCODING: &str = "snappy";
/// Header carrying the remote write protocol version.
pub const HEADER_NAME_REMOTE_WRITE_VERSION: &str = "X-Prometheus-Remote-Write-Version";
/// Remote write protocol version spoken by this crate.
pub const REMOTE_WRITE_VERSION_01: &str = "0.1.0";

/// A write request.
///
/// .proto:
/// ```protobuf
/// message WriteRequest {
///   repeated TimeSeries timeseries = 1;
///   // Cortex uses this field to determine the source of the write request.
///   // We reserve it to avoid any compatibility issues.
///   reserved  2;
///   repeated MetricMetadata metadata = 3;
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct WriteRequest {
    /// Series carried by the request.
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
    /// Metric metadata. Never populated by this crate.
    #[prost(message, repeated, tag = "3")]
    pub metadata: Vec<MetricMetadata>,
}

impl WriteRequest {
    /// Creates a write request for the given series, with no metadata.
    pub fn new(timeseries: Vec<TimeSeries>) -> Self {
        Self { timeseries, metadata: Vec::new() }
    }

    /// Prepare the write request for sending.
    ///
    /// Ensures that the request conforms to the remote write protocol.
    /// See https://prometheus.io/docs/concepts/remote_write_spec.
    fn sort(&mut self) {
        for series in &mut self.timeseries {
            series.sort_labels_and_samples();
        }
    }

    fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    /// Encode this write request as a protobuf message.
    pub fn encode_proto3(self) -> Vec<u8> {
        self.sorted().encode_to_vec()
    }

    /// Encode this write request as a compressed protobuf message.
    ///
    /// NOTE: The API requires snappy compression, not a raw protobuf message.
    pub fn encode_compressed(self) -> Result<Vec<u8>, snap::Error> {
        snap::raw::Encoder::new().compress_vec(&self.encode_proto3())
    }

    /// Decode a write request from a compressed protobuf message.
    pub fn decode_compressed(buf: &[u8]) -> Result<Self, DecodeError> {
        let raw = snap::raw::Decoder::new().decompress_vec(buf)?;
        Ok(<Self as prost::Message>::decode(raw.as_slice())?)
    }
}

/// Encodes the given series into a compressed write request payload.
///
/// Series order is preserved, and the same input always produces the same bytes.
pub fn encode(series: Vec<TimeSeries>) -> Result<Bytes, EncodeError> {
    let compressed = WriteRequest::new(series).encode_compressed()?;
    Ok(Bytes::from(compressed))
}

/// Build a fully prepared HTTP request that can be sent to a remote write endpoint.
pub fn build_http_request(
    payload: Bytes,
    endpoint: &Uri,
    user_agent: &str,
) -> Result<Request<Full<Bytes>>, http::Error> {
    Request::builder()
        .method(Method::POST)
        .uri(endpoint.clone())
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(HEADER_NAME_REMOTE_WRITE_VERSION, REMOTE_WRITE_VERSION_01)
        .header(header::CONTENT_ENCODING, CONTENT_ENCODING)
        .header(header::USER_AGENT, user_agent)
        .body(Full::new(payload))
}

/// A time series.
///
/// .proto:
/// ```protobuf
/// message TimeSeries {
///   repeated Label labels   = 1;
///   repeated Sample samples = 2;
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct TimeSeries {
    /// Labels identifying the series, including [`LABEL_NAME`].
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    /// Samples of the series.
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Sort labels by name, and the samples by timestamp.
    ///
    /// Required by the remote write protocol.
    pub fn sort_labels_and_samples(&mut self) {
        self.labels.sort_by(|a, b| a.name.cmp(&b.name));
        self.samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    }

    /// Returns the value of the label with the given name, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.iter().find(|l| l.name == name).map(|l| l.value.as_str())
    }
}

/// A label.
///
/// .proto:
/// ```protobuf
/// message Label {
///   string name  = 1;
///   string value = 2;
/// }
/// ```
#[derive(prost::Message, Clone, Hash, PartialEq, Eq)]
pub struct Label {
    /// Label name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Label value.
    #[prost(string, tag = "2")]
    pub value: String,
}

impl Label {
    /// Creates a new `Label`.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self { name: name.into(), value: value.into() }
    }
}

/// A sample.
///
/// .proto:
/// ```protobuf
/// message Sample {
///   double value    = 1;
///   int64 timestamp = 2;
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct Sample {
    /// Sample value.
    #[prost(double, tag = "1")]
    pub value: f64,
    /// Timestamp in milliseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// Metadata about a metric family.
///
/// .proto:
/// ```protobuf
/// message MetricMetadata {
///   MetricType type = 1;
///   string metric_family_name = 2;
///   string help = 4;
///   string unit = 5;
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct MetricMetadata {
    /// Type of the metric family.
    #[prost(enumeration = "MetricType", tag = "1")]
    pub r#type: i32,
    /// Name of the metric family.
    #[prost(string, tag = "2")]
    pub metric_family_name: String,
    /// Help text.
    #[prost(string, tag = "4")]
    pub help: String,
    /// Unit of the metric family.
    #[prost(string, tag = "5")]
    pub unit: String,
}

/// Type of a metric family, as carried in [`MetricMetadata`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    /// Unknown type.
    Unknown = 0,
    /// Counter.
    Counter = 1,
    /// Gauge.
    Gauge = 2,
    /// Histogram.
    Histogram = 3,
    /// Gauge histogram.
    GaugeHistogram = 4,
    /// Summary.
    Summary = 5,
    /// Info.
    Info = 6,
    /// State set.
    Stateset = 7,
}

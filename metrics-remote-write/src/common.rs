use thiserror::Error as ThisError;

/// Errors that could occur while building a remote write datasource.
#[derive(Debug, ThisError)]
pub enum BuildError {
    /// A remote write endpoint could not be parsed.
    #[error("invalid remote write endpoint '{url}' for target '{name}': {reason}")]
    InvalidEndpoint {
        /// Name of the target.
        name: String,
        /// Endpoint as it was configured.
        url: String,
        /// Details about the parsing failure.
        reason: String,
    },

    /// No usable remote write targets remained after parsing the configuration.
    #[error("no remote write targets configured")]
    NoRemoteWriteTargets,

    /// The dispatch queue was configured with a capacity of zero.
    #[error("dispatch queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    /// The in-flight delivery limit was configured as zero.
    #[error("in-flight delivery limit must be greater than zero")]
    ZeroInFlightLimit,

    /// Creating the Tokio runtime or its thread did not succeed.
    #[error("failed to spawn Tokio runtime for dispatcher: {0}")]
    FailedToCreateRuntime(String),
}

/// Errors that could occur while converting metric points into time series.
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ConvertError {
    /// A point carried a name that is not a valid Prometheus metric name.
    #[error("invalid metric name '{name}'")]
    InvalidMetricName {
        /// The offending metric name.
        name: String,
    },
}

/// Errors that could occur while encoding a write request.
#[derive(Debug, ThisError)]
pub enum EncodeError {
    /// Snappy compression of the serialized request failed.
    #[error("failed to compress write request: {0}")]
    Compress(#[from] snap::Error),
}

/// Errors that could occur while decoding a write request.
#[derive(Debug, ThisError)]
pub enum DecodeError {
    /// The payload was not a valid Snappy block.
    #[error("failed to decompress write request: {0}")]
    Decompress(#[from] snap::Error),

    /// The decompressed payload was not a valid write request.
    #[error("failed to decode write request: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Errors that could occur while submitting metric points.
#[derive(Debug, ThisError)]
pub enum RemoteWriteError {
    /// The batch could not be converted.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The dispatch queue is no longer being consumed.
    #[error("dispatch queue is closed")]
    QueueClosed,
}

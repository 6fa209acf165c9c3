use std::fmt;
use std::time::Duration;

use hyper::{StatusCode, Uri};
use thiserror::Error as ThisError;

use crate::remote_write_proto::{TimeSeries, WriteRequest};

/// Maximum number of response body bytes kept when a delivery fails.
pub const MAX_ERROR_BODY_LEN: usize = 512;

/// Errors that could occur while delivering a payload to a remote write endpoint.
#[derive(Debug, ThisError)]
pub enum DeliveryError {
    /// The HTTP request could not be built.
    #[error("failed to build remote write request: {0}")]
    Request(#[source] http::Error),

    /// The request could not be sent, or no response was received.
    #[error("error sending request to remote write endpoint: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),

    /// The request did not complete within the target's timeout.
    #[error("remote write request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint rejected the payload as malformed.
    #[error("server returned HTTP status {status}: {body}, req: {samples:?}")]
    BadRequest {
        /// Response status.
        status: StatusCode,
        /// First line of the response body.
        body: String,
        /// Series carried by the rejected payload.
        samples: Vec<TimeSeries>,
    },

    /// The endpoint failed to process the payload.
    #[error("server returned HTTP status {status}: {body}")]
    ServerError {
        /// Response status.
        status: StatusCode,
        /// First line of the response body.
        body: String,
    },

    /// The endpoint responded with a status that is neither success nor a server error.
    #[error("server returned HTTP status {status}: {body}")]
    UnexpectedStatus {
        /// Response status.
        status: StatusCode,
        /// First line of the response body.
        body: String,
    },
}

impl DeliveryError {
    /// Returns `true` if the failure is transient and the same payload may succeed later.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DeliveryError::Transport(_)
            | DeliveryError::Timeout(_)
            | DeliveryError::ServerError { .. } => true,
            DeliveryError::Request(_)
            | DeliveryError::BadRequest { .. }
            | DeliveryError::UnexpectedStatus { .. } => false,
        }
    }
}

/// Classification of a finished delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint accepted the payload.
    Success,
    /// The delivery failed for a transient reason.
    Recoverable,
    /// The delivery failed and would fail again with the same payload.
    NonRecoverable,
}

impl Outcome {
    /// Returns a short, static identifier for the outcome.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Recoverable => "recoverable",
            Outcome::NonRecoverable => "non_recoverable",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of delivering one payload to one target.
#[derive(Debug)]
pub struct DeliveryReport {
    /// Name of the target.
    pub target: String,
    /// Endpoint the payload was posted to.
    pub endpoint: Uri,
    /// Number of attempts made, including retries.
    pub attempts: u32,
    /// Time spent on the delivery, including any backoff between attempts.
    pub elapsed: Duration,
    /// Result of the last attempt.
    pub result: Result<(), DeliveryError>,
}

impl DeliveryReport {
    /// Classifies the delivery.
    pub fn outcome(&self) -> Outcome {
        match &self.result {
            Ok(()) => Outcome::Success,
            Err(e) if e.is_recoverable() => Outcome::Recoverable,
            Err(_) => Outcome::NonRecoverable,
        }
    }
}

/// Maps a response status to the delivery result.
///
/// `body` is the response body snippet, and `payload` the compressed request that was sent, which is decoded
/// to annotate `400 Bad Request` failures.
pub(crate) fn classify_response(status: StatusCode, body: String, payload: &[u8]) -> Result<(), DeliveryError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::BAD_REQUEST {
        let samples = WriteRequest::decode_compressed(payload).map(|req| req.timeseries).unwrap_or_default();
        Err(DeliveryError::BadRequest { status, body, samples })
    } else if status.is_server_error() {
        Err(DeliveryError::ServerError { status, body })
    } else {
        Err(DeliveryError::UnexpectedStatus { status, body })
    }
}

/// Extracts the first line from at most [`MAX_ERROR_BODY_LEN`] bytes of a response body.
pub(crate) fn body_snippet(raw: &[u8]) -> String {
    let raw = &raw[..raw.len().min(MAX_ERROR_BODY_LEN)];
    let line = raw.split(|b| *b == b'\n').next().unwrap_or_default();
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

//! An asynchronous dispatcher for pushing metric points to Prometheus remote write endpoints.
//!
//! ## Basics
//!
//! Points are written through a [`Datasource`], which converts each [`MetricPoint`] into a Prometheus
//! time series and queues the batch for delivery. A single background consumer drains the queue, encodes
//! each batch as a Snappy-compressed protobuf `WriteRequest`, and posts it to every configured endpoint
//! concurrently.
//!
//! Writing returns as soon as the batch is queued. The caller only ever sees conversion failures, such as an
//! invalid metric name: delivery failures are classified and handed to a [`DeliveryObserver`], which by
//! default logs them through `tracing` and counts them through `metrics`.
//!
//! ## Conversion
//!
//! Every point becomes exactly one time series with exactly one sample:
//!
//! - the metric name is carried by the `__name__` label, and must match `[a-zA-Z_:][a-zA-Z0-9_:]*`, or the
//!   whole batch is rejected
//! - tags whose key does not match `[a-zA-Z_][a-zA-Z0-9_]*` are silently dropped
//! - timestamps are converted from seconds to milliseconds
//!
//! ## Delivery
//!
//! Each endpoint receives the payload independently, with its own timeout. Responses are classified as
//! follows:
//!
//! - `2xx` is a success
//! - `400 Bad Request` is not recoverable, and the report carries the series that were rejected
//! - `5xx`, transport errors and timeouts are recoverable
//! - anything else is not recoverable
//!
//! Recoverable failures are not retried unless a [`RetryPolicy`] is configured.
//!
//! ## Usage
//!
//! ```no_run
//! use metrics_remote_write::{Datasource, DatasourceConfig, MetricPoint, RemoteConfig};
//!
//! let config = DatasourceConfig::new()
//!     .with_remote_write(RemoteConfig::new("prometheus", "http://127.0.0.1:9090/api/v1/write"));
//! let datasource = Datasource::init(&config).expect("failed to initialize datasource");
//!
//! let point = MetricPoint::new("jobs_completed", 1_700_000_000, 42.0).with_tag("env", "prod");
//! datasource.blocking_remote_write(&[point]).expect("failed to queue points");
//! ```
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod alarm;
pub use self::alarm::{dump_object_key, oom_dump_alarm, OOM_DUMP_METRIC};

mod common;
pub use self::common::{BuildError, ConvertError, DecodeError, EncodeError, RemoteWriteError};

mod config;
pub use self::config::{
    DatasourceConfig, RemoteConfig, RetryPolicy, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_REMOTE_TIMEOUT, DEFAULT_USER_AGENT,
};

mod convert;
pub use self::convert::convert;

mod datasource;
pub use self::datasource::Datasource;

mod delivery;
pub use self::delivery::{DeliveryError, DeliveryReport, Outcome, MAX_ERROR_BODY_LEN};

mod observer;
pub use self::observer::{DeliveryObserver, TracingObserver};

mod point;
pub use self::point::{is_valid_label_name, is_valid_metric_name, MetricPoint};

mod queue;

pub mod remote_write_proto;

mod sender;
pub use self::sender::Sender;

mod target;
pub use self::target::RemoteTarget;

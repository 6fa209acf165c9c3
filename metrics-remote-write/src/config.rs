use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::common::BuildError;
use crate::observer::{DeliveryObserver, TracingObserver};

/// Default timeout applied to each request sent to a remote write endpoint.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity, in batches, of the dispatch queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default limit on deliveries in flight across all batches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("metrics-remote-write/", env!("CARGO_PKG_VERSION"));

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Configuration of a single remote write endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Name of the endpoint, used to tell targets apart in logs and telemetry.
    pub name: String,

    /// URL of the remote write endpoint, such as `http://127.0.0.1:9090/api/v1/write`.
    pub url: String,

    /// Timeout applied to each request sent to the endpoint.
    pub remote_timeout: Duration,
}

impl RemoteConfig {
    /// Creates a new `RemoteConfig` using the default timeout.
    pub fn new<N, U>(name: N, url: U) -> Self
    where
        N: Into<String>,
        U: Into<String>,
    {
        Self { name: name.into(), url: url.into(), remote_timeout: DEFAULT_REMOTE_TIMEOUT }
    }

    /// Sets the timeout applied to each request sent to the endpoint.
    ///
    /// When the timeout is reached, the request is aborted and the delivery is reported as a recoverable
    /// failure.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}

/// Retry policy for recoverable delivery failures.
///
/// Only failures classified as recoverable (transport errors, timeouts, and 5xx responses) are retried.
/// The delay before retry `n` is `initial_backoff * 2^(n - 1)`, capped at `max_backoff`.
///
/// The default policy never retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy that never retries.
    pub const fn none() -> Self {
        Self { max_retries: 0, initial_backoff: DEFAULT_INITIAL_BACKOFF, max_backoff: DEFAULT_MAX_BACKOFF }
    }

    /// Creates a policy that retries up to `max_retries` times with exponential backoff.
    pub const fn exponential(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self { max_retries, initial_backoff, max_backoff }
    }

    /// Maximum number of retries after the first attempt.
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the delay to wait before the given retry, starting from 1.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Configuration for a remote write [`Datasource`][crate::Datasource].
///
/// Built once at startup and handed to [`Datasource::init`][crate::Datasource::init] by reference.
#[derive(Clone)]
pub struct DatasourceConfig {
    pub(crate) remote_write: Vec<RemoteConfig>,
    pub(crate) queue_capacity: usize,
    pub(crate) max_in_flight: usize,
    pub(crate) user_agent: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) observer: Arc<dyn DeliveryObserver>,
}

impl DatasourceConfig {
    /// Creates a new, empty `DatasourceConfig`.
    ///
    /// At least one remote write endpoint must be added before the configuration can be used.
    pub fn new() -> Self {
        Self {
            remote_write: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::none(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Adds a remote write endpoint.
    #[must_use]
    pub fn with_remote_write(mut self, remote: RemoteConfig) -> Self {
        self.remote_write.push(remote);
        self
    }

    /// Sets the capacity, in batches, of the dispatch queue.
    ///
    /// When the queue is full, callers writing points wait until the consumer frees up space.
    ///
    /// Defaults to 10,000.
    ///
    /// ## Errors
    ///
    /// If the capacity is zero, an error variant will be returned.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Result<Self, BuildError> {
        if capacity == 0 {
            return Err(BuildError::ZeroQueueCapacity);
        }

        self.queue_capacity = capacity;
        Ok(self)
    }

    /// Sets the limit on deliveries in flight across all batches.
    ///
    /// Each batch needs one slot per remote write endpoint. When the limit is reached, the consumer stops
    /// taking batches off the queue until earlier deliveries complete. The limit is raised to the number of
    /// endpoints if it is lower.
    ///
    /// Defaults to 256.
    ///
    /// ## Errors
    ///
    /// If the limit is zero, an error variant will be returned.
    pub fn with_max_in_flight(mut self, limit: usize) -> Result<Self, BuildError> {
        if limit == 0 {
            return Err(BuildError::ZeroInFlightLimit);
        }

        self.max_in_flight = limit;
        Ok(self)
    }

    /// Sets the `User-Agent` header sent with every request.
    #[must_use]
    pub fn with_user_agent<S>(mut self, user_agent: S) -> Self
    where
        S: Into<String>,
    {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the retry policy for recoverable delivery failures.
    ///
    /// Defaults to [`RetryPolicy::none`].
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the observer that receives the outcome of every delivery.
    ///
    /// Defaults to [`TracingObserver`].
    #[must_use]
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: DeliveryObserver,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Returns the configured remote write endpoints.
    pub fn remote_write(&self) -> &[RemoteConfig] {
        &self.remote_write
    }
}

impl fmt::Debug for DatasourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasourceConfig")
            .field("remote_write", &self.remote_write)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_in_flight", &self.max_in_flight)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        DatasourceConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DatasourceConfig, RemoteConfig, RetryPolicy, DEFAULT_QUEUE_CAPACITY, DEFAULT_REMOTE_TIMEOUT};
    use crate::common::BuildError;

    #[test]
    fn test_defaults() {
        let config = DatasourceConfig::new();
        assert!(config.remote_write().is_empty());
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.retry, RetryPolicy::none());

        let remote = RemoteConfig::new("prometheus", "http://127.0.0.1:9090/api/v1/write");
        assert_eq!(remote.remote_timeout, DEFAULT_REMOTE_TIMEOUT);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(matches!(
            DatasourceConfig::new().with_queue_capacity(0),
            Err(BuildError::ZeroQueueCapacity)
        ));
        assert!(matches!(
            DatasourceConfig::new().with_max_in_flight(0),
            Err(BuildError::ZeroInFlightLimit)
        ));
    }

    #[test]
    fn test_backoff() {
        let policy =
            RetryPolicy::exponential(10, Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_debug_skips_observer() {
        let config = DatasourceConfig::new()
            .with_remote_write(RemoteConfig::new("prometheus", "http://127.0.0.1:9090/api/v1/write"));
        let output = format!("{config:?}");

        assert!(output.starts_with("DatasourceConfig {"), "{output}");
        assert!(output.contains("prometheus"), "{output}");
        assert!(output.contains("queue_capacity: 10000"), "{output}");
        assert!(!output.contains("observer"), "{output}");
    }

    #[test]
    fn test_no_retries_by_default() {
        assert_eq!(RetryPolicy::default().max_retries(), 0);
    }
}

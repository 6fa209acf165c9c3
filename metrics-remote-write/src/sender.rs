use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::config::RetryPolicy;
use crate::delivery::{body_snippet, classify_response, DeliveryError, DeliveryReport, MAX_ERROR_BODY_LEN};
use crate::remote_write_proto::build_http_request;
use crate::target::RemoteTarget;

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Delivers payloads to every configured remote write target.
///
/// Each delivery runs as its own task, so a slow or failing target never holds up the others. Cloning a
/// `Sender` is cheap, and clones share the same connection pool.
#[derive(Clone)]
pub struct Sender {
    client: HttpClient,
    targets: Arc<[RemoteTarget]>,
    user_agent: Arc<str>,
    retry: RetryPolicy,
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("targets", &self.targets)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Sender {
    /// Creates a new `Sender` for the given targets.
    pub fn new(targets: Vec<RemoteTarget>, user_agent: &str, retry: RetryPolicy) -> Self {
        Self {
            client: build_client(),
            targets: targets.into(),
            user_agent: user_agent.into(),
            retry,
        }
    }

    /// Targets that payloads are delivered to.
    pub fn targets(&self) -> &[RemoteTarget] {
        &self.targets
    }

    /// Spawns one delivery task per target for the given payload.
    ///
    /// The tasks run independently of each other, and of the returned set: dropping the set aborts any
    /// delivery that has not finished yet.
    ///
    /// ## Panics
    ///
    /// This method must be called from within a Tokio runtime.
    pub fn launch(&self, payload: Bytes) -> JoinSet<DeliveryReport> {
        let mut deliveries = JoinSet::new();
        for target in self.targets.iter() {
            let client = self.client.clone();
            let target = target.clone();
            let user_agent = Arc::clone(&self.user_agent);
            let retry = self.retry;
            let payload = payload.clone();

            deliveries.spawn(async move { deliver(&client, &target, &user_agent, retry, payload).await });
        }
        deliveries
    }

    /// Delivers the payload to every target and waits for all of the deliveries to finish.
    ///
    /// Reports are returned in completion order.
    pub async fn dispatch(&self, payload: Bytes) -> Vec<DeliveryReport> {
        let mut deliveries = self.launch(payload);
        let mut reports = Vec::with_capacity(self.targets.len());
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Remote write delivery task failed."),
            }
        }
        reports
    }
}

fn build_client() -> HttpClient {
    let builder = hyper_rustls::HttpsConnectorBuilder::new();
    let builder = match builder.with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!(error = %e, "No native root CA certificates found. Falling back to bundled roots.");
            hyper_rustls::HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };
    let https = builder.https_or_http().enable_http1().build();

    Client::builder(TokioExecutor::new()).pool_idle_timeout(Duration::from_secs(30)).build(https)
}

async fn deliver(
    client: &HttpClient,
    target: &RemoteTarget,
    user_agent: &str,
    retry: RetryPolicy,
    payload: Bytes,
) -> DeliveryReport {
    let start = Instant::now();
    let mut attempts = 0;

    let result = loop {
        attempts += 1;
        match send_once(client, target, user_agent, payload.clone()).await {
            Err(e) if e.is_recoverable() && attempts <= retry.max_retries() => {
                let backoff = retry.backoff(attempts);
                debug!(
                    target_name = target.name(),
                    attempts,
                    ?backoff,
                    error = %e,
                    "Retrying remote write delivery after recoverable failure."
                );
                tokio::time::sleep(backoff).await;
            }
            result => break result,
        }
    };

    DeliveryReport {
        target: target.name().to_string(),
        endpoint: target.endpoint().clone(),
        attempts,
        elapsed: start.elapsed(),
        result,
    }
}

async fn send_once(
    client: &HttpClient,
    target: &RemoteTarget,
    user_agent: &str,
    payload: Bytes,
) -> Result<(), DeliveryError> {
    let req = build_http_request(payload.clone(), target.endpoint(), user_agent)
        .map_err(DeliveryError::Request)?;

    // Dropping the request future on timeout aborts the request and releases the connection.
    let deadline = Instant::now() + target.timeout();
    let response = match timeout_at(deadline, client.request(req)).await {
        Ok(response) => response.map_err(DeliveryError::Transport)?,
        Err(_) => return Err(DeliveryError::Timeout(target.timeout())),
    };

    let status = response.status();
    let mut body = response.into_body();

    if status.is_success() {
        // The payload was accepted. Draining the body only lets the connection go back to the pool, so a
        // failure here does not change the result.
        match timeout_at(deadline, body.collect()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(target_name = target.name(), error = %e, "Failed to drain response body.")
            }
            Err(_) => debug!(target_name = target.name(), "Timed out draining response body."),
        }
        return Ok(());
    }

    let raw = match timeout_at(deadline, read_error_body(&mut body)).await {
        Ok(raw) => raw,
        Err(_) => return Err(DeliveryError::Timeout(target.timeout())),
    };

    classify_response(status, body_snippet(&raw), &payload)
}

async fn read_error_body(body: &mut Incoming) -> Vec<u8> {
    let mut raw = Vec::with_capacity(MAX_ERROR_BODY_LEN);
    while raw.len() < MAX_ERROR_BODY_LEN {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    let take = data.len().min(MAX_ERROR_BODY_LEN - raw.len());
                    raw.extend_from_slice(&data[..take]);
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "Failed to read response body from remote write endpoint.");
                break;
            }
            None => break,
        }
    }
    raw
}

use std::time::Duration;

use hyper::Uri;
use tracing::error;

use crate::common::BuildError;
use crate::config::RemoteConfig;

/// A remote write endpoint that payloads are delivered to.
#[derive(Clone, Debug)]
pub struct RemoteTarget {
    name: String,
    endpoint: Uri,
    timeout: Duration,
}

impl RemoteTarget {
    /// Creates a new `RemoteTarget`.
    pub fn new<N>(name: N, endpoint: Uri, timeout: Duration) -> Self
    where
        N: Into<String>,
    {
        Self { name: name.into(), endpoint, timeout }
    }

    /// Creates a `RemoteTarget` from its configuration.
    ///
    /// ## Errors
    ///
    /// If the configured URL cannot be parsed into an absolute `http` or `https` URI, an error variant will
    /// be returned describing the error.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, BuildError> {
        let invalid = |reason: String| BuildError::InvalidEndpoint {
            name: config.name.clone(),
            url: config.url.clone(),
            reason,
        };

        let endpoint = Uri::try_from(config.url.as_str()).map_err(|e| invalid(e.to_string()))?;
        match endpoint.scheme_str() {
            Some("http") | Some("https") => {}
            Some(scheme) => return Err(invalid(format!("unsupported scheme '{scheme}'"))),
            None => return Err(invalid("missing scheme".to_string())),
        }
        if endpoint.authority().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self::new(config.name.as_str(), endpoint, config.remote_timeout))
    }

    /// Name of the target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint that payloads are posted to.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Timeout applied to each request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builds the target list, skipping any endpoint that fails to parse.
///
/// ## Errors
///
/// If no targets remain after parsing, `BuildError::NoRemoteWriteTargets` is returned.
pub(crate) fn targets_from_config(configs: &[RemoteConfig]) -> Result<Vec<RemoteTarget>, BuildError> {
    let targets = configs
        .iter()
        .filter_map(|config| match RemoteTarget::from_config(config) {
            Ok(target) => Some(target),
            Err(e) => {
                error!(error = %e, "Skipping remote write target.");
                None
            }
        })
        .collect::<Vec<_>>();

    if targets.is_empty() {
        return Err(BuildError::NoRemoteWriteTargets);
    }

    Ok(targets)
}

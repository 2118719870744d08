//! JSON-over-HTTP control channel.
//!
//! Routes, relative to the allocation's control endpoint:
//!
//! | Call    | Method | Path               | Success body               |
//! |---------|--------|--------------------|----------------------------|
//! | suspend | POST   | `control/suspend`  | ignored                    |
//! | serve   | POST   | `control/serve`    | ignored                    |
//! | health  | GET    | `control/health`   | `{"healthy": <bool>}`      |
//! | version | GET    | `control/version`  | `{"version": "<build>"}`   |

use std::time::Duration;

use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ChannelConnector, ControlCall, ControlChannel, ControlError, ControlFuture};
use crate::registry::ClusterAllocation;

/// Timeout applied to control calls when the caller does not supply one.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct HealthBody {
    healthy: bool,
}

#[derive(Debug, Deserialize)]
struct VersionBody {
    version: String,
}

/// Control channel speaking to one allocation over HTTP.
#[derive(Clone, Debug)]
pub struct HttpControlChannel {
    client: reqwest::Client,
    base: Url,
}

impl HttpControlChannel {
    /// Creates a channel for `endpoint` whose calls time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidEndpoint`] when `endpoint` is not an
    /// absolute URL.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ControlError> {
        let mut base = Url::parse(endpoint).map_err(|err| ControlError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            message: err.to_string(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self { client, base })
    }

    /// Base URL calls are resolved against.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn route(call: ControlCall) -> (Method, &'static str) {
        match call {
            ControlCall::Suspend => (Method::POST, "control/suspend"),
            ControlCall::Serve => (Method::POST, "control/serve"),
            ControlCall::Health => (Method::GET, "control/health"),
            ControlCall::Version => (Method::GET, "control/version"),
        }
    }

    fn unavailable(&self, call: ControlCall, message: String) -> ControlError {
        ControlError::ClusterUnavailable {
            endpoint: self.base.to_string(),
            call,
            message,
        }
    }

    async fn send(&self, call: ControlCall) -> Result<String, ControlError> {
        let (method, path) = Self::route(call);
        let url = self.base.join(path).map_err(|err| ControlError::InvalidEndpoint {
            endpoint: self.base.to_string(),
            message: err.to_string(),
        })?;

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|err| {
                warn!(endpoint = %self.base, %call, error = %err, "control call failed");
                self.unavailable(call, err.to_string())
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.unavailable(call, err.to_string()))?;

        if !status.is_success() {
            debug!(endpoint = %self.base, %call, %status, "control call rejected");
            return Err(ControlError::Rejected {
                call,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, call: ControlCall) -> Result<T, ControlError> {
        let body = self.send(call).await?;
        serde_json::from_str(&body).map_err(|err| ControlError::Protocol {
            call,
            message: err.to_string(),
        })
    }
}

impl ControlChannel for HttpControlChannel {
    fn suspend(&self) -> ControlFuture<'_, ()> {
        Box::pin(async move { self.send(ControlCall::Suspend).await.map(|_| ()) })
    }

    fn serve(&self) -> ControlFuture<'_, ()> {
        Box::pin(async move { self.send(ControlCall::Serve).await.map(|_| ()) })
    }

    fn health_check(&self) -> ControlFuture<'_, bool> {
        Box::pin(async move {
            self.send_json::<HealthBody>(ControlCall::Health)
                .await
                .map(|body| body.healthy)
        })
    }

    fn version(&self) -> ControlFuture<'_, String> {
        Box::pin(async move {
            self.send_json::<VersionBody>(ControlCall::Version)
                .await
                .map(|body| body.version)
        })
    }
}

/// Connector producing [`HttpControlChannel`]s from allocation contexts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    /// Creates a connector whose channels use `timeout` for every call.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_TIMEOUT)
    }
}

impl ChannelConnector for HttpConnector {
    type Channel = HttpControlChannel;

    fn connect(&self, allocation: &ClusterAllocation) -> Result<Self::Channel, ControlError> {
        HttpControlChannel::new(&allocation.context.endpoint, self.timeout)
    }
}

//! Pebble API client over the container's unix socket.
//!
//! Each call opens a fresh HTTP/1.1 connection, the same way the Pebble CLI
//! does, so a restarted Pebble never leaves a stale connection behind.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use motd_core::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::UnixStream;
use tracing::{debug, info, instrument};

use crate::layer::Layer;
use crate::plan::ServicePlan;
use crate::supervisor::Supervisor;

/// Response envelope shared by every Pebble endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "status-code", default)]
    status_code: u16,
    #[serde(default)]
    status: String,
    #[serde(default)]
    change: Option<String>,
    #[serde(default)]
    result: Value,
}

impl Envelope {
    fn error_message(&self) -> String {
        self.result
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", self.status_code, self.status))
    }
}

/// A Pebble change, as returned when waiting on an async operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub summary: String,
    pub status: String,
    pub ready: bool,
    #[serde(default)]
    pub err: Option<String>,
}

impl Change {
    /// Error text if the change did not finish cleanly.
    pub fn failure(&self) -> Option<String> {
        match &self.err {
            Some(err) if !err.is_empty() => Some(err.clone()),
            _ if self.status == "Error" => Some(format!("change {} failed", self.id)),
            _ if !self.ready => Some(format!("change {} did not finish in time", self.id)),
            _ => None,
        }
    }
}

/// Deadline for a single request other than a change wait.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack on top of the server-side wait so Pebble gets to answer first.
const WAIT_MARGIN: Duration = Duration::from_secs(5);

pub struct PebbleClient {
    socket: PathBuf,
    change_timeout: Duration,
    request_timeout: Duration,
}

impl PebbleClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            change_timeout: Duration::from_secs(30),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_change_timeout(mut self, timeout: Duration) -> Self {
        self.change_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        fail: fn(String) -> Error,
    ) -> Result<Envelope> {
        self.call_within(self.request_timeout, method, path, body, fail)
            .await
    }

    /// Send one request and unwrap the envelope, giving up after `limit`.
    ///
    /// `fail` builds the error for this operation, so transport problems,
    /// timeouts and API errors surface under the variant the caller promises.
    async fn call_within(
        &self,
        limit: Duration,
        method: Method,
        path: &str,
        body: Option<Value>,
        fail: fn(String) -> Error,
    ) -> Result<Envelope> {
        match tokio::time::timeout(limit, self.exchange(method.clone(), path, body, fail)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(fail(format!("{method} {path} timed out after {limit:?}"))),
        }
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        fail: fn(String) -> Error,
    ) -> Result<Envelope> {
        let stream = UnixStream::connect(&self.socket).await.map_err(|e| {
            fail(format!("cannot connect to {}: {}", self.socket.display(), e))
        })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| fail(format!("handshake failed: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "Pebble connection closed with error");
            }
        });

        let payload = match body {
            Some(value) => Bytes::from(serde_json::to_vec(&value)?),
            None => Bytes::new(),
        };
        let request = Request::builder()
            .method(method.clone())
            .uri(path)
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))
            .map_err(|e| fail(format!("invalid request: {e}")))?;

        debug!(%method, path, "Pebble request");
        let response = sender
            .send_request(request)
            .await
            .map_err(|e| fail(format!("{method} {path} failed: {e}")))?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| fail(format!("reading response failed: {e}")))?
            .to_bytes();

        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| fail(format!("invalid response ({status}): {e}")))?;

        if envelope.kind == "error" || !status.is_success() {
            return Err(fail(envelope.error_message()));
        }
        Ok(envelope)
    }

    /// Block until the change finishes or the timeout passes.
    pub async fn wait_change(&self, id: &str) -> Result<Change> {
        let path = format!(
            "/v1/changes/{}/wait?timeout={}s",
            id,
            self.change_timeout.as_secs()
        );
        let limit = self.change_timeout + WAIT_MARGIN;
        let envelope = self
            .call_within(limit, Method::GET, &path, None, Error::ReconciliationFailed)
            .await?;
        serde_json::from_value(envelope.result)
            .map_err(|e| Error::ReconciliationFailed(format!("invalid change {id}: {e}")))
    }
}

#[async_trait]
impl Supervisor for PebbleClient {
    async fn can_connect(&self) -> bool {
        self.call(Method::GET, "/v1/system-info", None, Error::SupervisorUnavailable)
            .await
            .is_ok()
    }

    #[instrument(skip(self, layer), fields(socket = %self.socket.display()))]
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let yaml = layer.to_yaml()?;
        let body = json!({
            "action": "add",
            "label": label,
            "combine": combine,
            "format": "yaml",
            "layer": yaml,
        });
        self.call(Method::POST, "/v1/layers", Some(body), Error::SupervisorUnavailable)
            .await?;
        info!(label, "Layer added");
        Ok(())
    }

    #[instrument(skip(self), fields(socket = %self.socket.display()))]
    async fn replan(&self) -> Result<()> {
        let body = json!({"action": "replan", "services": []});
        let envelope = self
            .call(Method::POST, "/v1/services", Some(body), Error::ReconciliationFailed)
            .await?;

        let Some(id) = envelope.change else {
            // Older Pebble versions answer synchronously when there is nothing to do.
            return Ok(());
        };

        let change = self.wait_change(&id).await?;
        if let Some(err) = change.failure() {
            return Err(Error::ReconciliationFailed(err));
        }
        info!(change = %change.id, status = %change.status, "Replan finished");
        Ok(())
    }

    async fn plan(&self) -> Result<ServicePlan> {
        let envelope = self
            .call(Method::GET, "/v1/plan?format=yaml", None, Error::SupervisorUnavailable)
            .await?;
        match envelope.result {
            Value::String(yaml) => ServicePlan::from_yaml(&yaml),
            Value::Null => Ok(ServicePlan::default()),
            other => Err(Error::SupervisorUnavailable(format!(
                "unexpected plan payload: {other}"
            ))),
        }
    }
}

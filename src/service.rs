//! Deadline-bounded calls to remote HTTP services.
//!
//! Requests run on a runtime worker and race a fixed deadline. On expiry the
//! worker is aborted and whatever it would have produced is discarded. There
//! is no retry anywhere; re-validation is always a user action.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::Handle;

pub const BODY_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl ServiceRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            bearer: None,
            body: Some(body),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceFailure {
    Timeout,
    Transport(String),
    Malformed(String),
}

impl ServiceFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceFailure::Timeout => "timeout",
            ServiceFailure::Transport(_) => "transport",
            ServiceFailure::Malformed(_) => "malformed",
        }
    }
}

impl std::fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceFailure::Timeout => write!(f, "request timed out"),
            ServiceFailure::Transport(msg) => write!(f, "request failed: {msg}"),
            ServiceFailure::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for ServiceFailure {}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ServiceRequest) -> Result<RawResponse, ServiceFailure>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("devsh/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ServiceRequest) -> Result<RawResponse, ServiceFailure> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ServiceFailure::Transport(err.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceFailure::Transport(err.without_url().to_string()))?;
        Ok(RawResponse { status, body })
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
    format!("{head}...")
}

/// Blocking facade over an [`HttpTransport`] with a hard deadline.
#[derive(Clone)]
pub struct BoundedClient {
    transport: Arc<dyn HttpTransport>,
    deadline: Duration,
    handle: Handle,
}

impl std::fmt::Debug for BoundedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedClient")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl BoundedClient {
    pub fn new(transport: Arc<dyn HttpTransport>, deadline: Duration, handle: Handle) -> Self {
        Self {
            transport,
            deadline,
            handle,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Send `request` on a worker and wait at most the deadline for it.
    pub fn invoke_raw(&self, request: ServiceRequest) -> Result<RawResponse, ServiceFailure> {
        let transport = Arc::clone(&self.transport);
        let worker = self.handle.spawn(async move { transport.send(request).await });
        let abort = worker.abort_handle();
        let deadline = self.deadline;

        self.handle.block_on(async move {
            match tokio::time::timeout(deadline, worker).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(ServiceFailure::Transport(format!(
                    "request worker failed: {join_err}"
                ))),
                Err(_) => {
                    abort.abort();
                    tracing::debug!(deadline_ms = deadline.as_millis() as u64, "request aborted at deadline");
                    Err(ServiceFailure::Timeout)
                }
            }
        })
    }

    /// Like [`invoke_raw`](Self::invoke_raw), but requires a 2xx status and a
    /// JSON body.
    pub fn invoke(&self, request: ServiceRequest) -> Result<Value, ServiceFailure> {
        let response = self.invoke_raw(request)?;
        if !response.is_success() {
            return Err(ServiceFailure::Transport(format!(
                "HTTP {}: {}",
                response.status,
                snippet(&response.body)
            )));
        }
        serde_json::from_str(&response.body)
            .map_err(|err| ServiceFailure::Malformed(format!("invalid JSON body: {err}")))
    }

    /// Minimal request used only to validate a credential.
    pub fn probe(&self, request: ServiceRequest) -> bool {
        match self.invoke(request) {
            Ok(_) => true,
            Err(failure) => {
                tracing::debug!(failure = failure.kind(), error = %failure, "credential probe failed");
                false
            }
        }
    }
}

/// Replays canned responses in order and records every request it sees.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    pub responses:
        Arc<std::sync::Mutex<std::collections::VecDeque<Result<RawResponse, ServiceFailure>>>>,
    pub requests: Arc<std::sync::Mutex<Vec<ServiceRequest>>>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(responses: Vec<Result<RawResponse, ServiceFailure>>) -> Self {
        let transport = Self::default();
        transport.responses.lock().unwrap().extend(responses);
        transport
    }

    pub fn push(&self, response: Result<RawResponse, ServiceFailure>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn sent(&self) -> Vec<ServiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ServiceRequest) -> Result<RawResponse, ServiceFailure> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceFailure::Transport("no scripted response".to_string())))
    }
}

/// Never answers within any reasonable deadline.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct HangingTransport {
    pub calls: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for HangingTransport {
    async fn send(&self, _request: ServiceRequest) -> Result<RawResponse, ServiceFailure> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(RawResponse::ok("{}"))
    }
}

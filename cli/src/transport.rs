#![deny(missing_docs)]

//! # HTTP Transport
//!
//! `ureq`-backed [`Transport`] used by `check-service`. Every status is
//! returned as a response; only network-level failures are errors. An
//! optional courtesy delay spaces consecutive calls.

use apidoc_core::{HttpRequest, HttpResponse, Transport, TransportError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Blocking transport over a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl UreqTransport {
    /// Creates a transport with a per-call timeout and a delay between calls.
    pub fn new(timeout: Duration, delay: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            delay,
            last_call: Mutex::new(None),
        }
    }

    fn pace(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut last = match self.last_call.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let waited = previous.elapsed();
            if waited < self.delay {
                thread::sleep(self.delay - waited);
            }
        }
        *last = Some(Instant::now());
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.pace();
        debug!(method = %request.method, target = %request.target, "sending request");

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.target.as_str());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let sent = if request.body.is_empty() {
            let built = builder.body(()).map_err(|e| TransportError::Other(e.to_string()))?;
            self.agent.run(built)
        } else {
            let built = builder
                .body(request.body.as_str())
                .map_err(|e| TransportError::Other(e.to_string()))?;
            self.agent.run(built)
        };
        let response = sent.map_err(classify)?;

        let status = response.status();
        let mut out = HttpResponse::new(status.as_u16(), status.canonical_reason().unwrap_or_default());
        out.version = format!("{:?}", response.version());
        for (name, value) in response.headers() {
            out.headers
                .append(name.as_str(), value.to_str().unwrap_or_default());
        }
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| TransportError::Other(format!("failed reading response body: {}", e)))?;
        Ok(out.with_body(body))
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed | ureq::Error::Io(_) => {
            TransportError::Connection(err.to_string())
        }
        other => TransportError::Other(other.to_string()),
    }
}

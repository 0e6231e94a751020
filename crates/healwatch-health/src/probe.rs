//! Health probes.
//!
//! A probe never fails outward: every problem (spawn error, non-zero exit,
//! refused connection, any status other than 200, timeout) becomes an
//! unhealthy [`ProbeOutcome`] with a diagnostic cut to [`MAX_DETAIL_CHARS`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use healwatch_core::{ProbeDescriptor, ServiceSpec, MAX_DETAIL_CHARS};

use crate::exec::{run_shell, Output};

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub healthy: bool,
    /// `"OK"` when healthy, otherwise a bounded diagnostic.
    pub detail: String,
    pub latency: Duration,
}

impl ProbeOutcome {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            healthy: true,
            detail: "OK".to_string(),
            latency,
        }
    }

    pub fn unhealthy(detail: &str, latency: Duration) -> Self {
        Self {
            healthy: false,
            detail: truncate_detail(detail),
            latency,
        }
    }
}

/// Boxed future returned by [`Prober::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;

/// Runs one health check for one service. Swapped out in tests.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a>;
}

/// Production prober: shell commands and HTTP(S) endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeExecutor;

impl Prober for ProbeExecutor {
    fn probe<'a>(&'a self, spec: &'a ServiceSpec) -> ProbeFuture<'a> {
        Box::pin(async move {
            let outcome = match &spec.probe {
                ProbeDescriptor::Command(cmd) => command_probe(cmd, spec.probe_timeout).await,
                ProbeDescriptor::Http(url) => http_probe(url, spec.probe_timeout).await,
            };
            debug!(
                service = %spec.name,
                healthy = outcome.healthy,
                latency_ms = outcome.latency.as_millis() as u64,
                detail = %outcome.detail,
                "probe finished"
            );
            outcome
        })
    }
}

/// Run a shell command; exit 0 is healthy.
pub async fn command_probe(command: &str, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let result = run_shell(command, timeout, Output::Capture).await;
    let latency = started.elapsed();
    if result.succeeded() {
        ProbeOutcome::healthy(latency)
    } else {
        ProbeOutcome::unhealthy(&result.diagnostic(), latency)
    }
}

/// GET `url`; only `200 OK` is healthy. Redirects are not followed.
pub async fn http_probe(url: &str, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let result = if url.starts_with("https://") {
        tokio::time::timeout(timeout, https_get_status(url, timeout)).await
    } else {
        tokio::time::timeout(timeout, http_get_status(url)).await
    };
    let latency = started.elapsed();

    match result {
        Ok(Ok(status)) if status == http::StatusCode::OK => ProbeOutcome::healthy(latency),
        Ok(Ok(status)) => {
            debug!(%status, %url, "health probe not OK");
            ProbeOutcome::unhealthy(&format!("HTTP {}", status.as_u16()), latency)
        }
        Ok(Err(detail)) => ProbeOutcome::unhealthy(&detail, latency),
        Err(_) => {
            debug!(%url, "health probe timed out");
            ProbeOutcome::unhealthy("timeout", latency)
        }
    }
}

async fn http_get_status(url: &str) -> Result<http::StatusCode, String> {
    let uri: http::Uri = url.parse().map_err(|e| format!("invalid url: {e}"))?;
    let authority = uri
        .authority()
        .ok_or_else(|| "invalid url: missing host".to_string())?;
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::ConnectionRefused => "connection refused".to_string(),
            _ => e.to_string(),
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("handshake failed: {e}"))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(path)
        .header("host", authority.as_str())
        .header("user-agent", "healwatch/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| format!("invalid request: {e}"))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    Ok(resp.status())
}

/// TLS endpoints go through reqwest; hyper here speaks plain HTTP only.
async fn https_get_status(url: &str, timeout: Duration) -> Result<http::StatusCode, String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent("healwatch/0.1")
        .build()
        .map_err(|e| format!("failed to build client: {e}"))?;

    let resp = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            "timeout".to_string()
        } else if e.is_builder() {
            format!("invalid url: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            format!("request failed: {e}")
        }
    })?;
    http::StatusCode::from_u16(resp.status().as_u16()).map_err(|e| format!("invalid status: {e}"))
}

/// Cut a diagnostic to at most [`MAX_DETAIL_CHARS`] characters.
pub fn truncate_detail(detail: &str) -> String {
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}

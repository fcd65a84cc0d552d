//! Single-request HTTP execution and outcome classification
//!
//! One executor is shared by every request task. It posts the JSON payload
//! to `/api/{x}/{y}` with a fixed per-request timeout and classifies the
//! result into a [`RequestOutcome`]. No failure here ever propagates out of
//! the request task; everything is folded into the outcome.
//!
//! One failure class gets special treatment: local ephemeral-port
//! exhaustion. Under sustained high concurrency the client side can run out
//! of source ports, which is expected and not actionable. Those failures
//! are counted but kept off every operator-facing surface: no log line
//! above trace level and never the operator-visible last error.

use reqwest::{Client, StatusCode, header};
use tracing::{trace, warn};

use crate::config::EngineConfig;
use crate::errors::EngineResult;

use super::payload::{Coordinate, Payload};

/// Upper bound on idle pooled connections per host. Sized for high request
/// rates against a single target.
const POOL_MAX_IDLE_PER_HOST: usize = 500;

/// Error response bodies are truncated to this many bytes for diagnostics.
const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Result of one request, consumed immediately by the stats aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// HTTP status < 400; the response body is ignored
    Success,
    Failure(FailureKind),
}

/// Per-request failure taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Transport or connection failure, including timeouts. `suppressed`
    /// marks ephemeral-port exhaustion, which only moves the error counter.
    Network { message: String, suppressed: bool },
    /// HTTP status >= 400, body captured for diagnostics
    Protocol { status: u16, message: String },
    /// Payload serialization failed; fatal to this request only
    Encoding { message: String },
}

impl FailureKind {
    /// Whether this failure must stay off every human-readable surface.
    pub fn suppressed(&self) -> bool {
        matches!(self, Self::Network { suppressed: true, .. })
    }

    /// Operator-facing message.
    pub fn message(&self) -> &str {
        match self {
            Self::Network { message, .. }
            | Self::Protocol { message, .. }
            | Self::Encoding { message } => message,
        }
    }
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Issues one HTTP call per invocation through a shared pooled client.
#[derive(Debug)]
pub struct RequestExecutor {
    client: Client,
    base_url: String,
}

impl RequestExecutor {
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.host, config.port),
        })
    }

    /// Execute one request and classify its outcome.
    ///
    /// Exactly one outcome per invocation; the caller pairs it with exactly
    /// one stats update and one limiter slot release.
    pub async fn execute(&self, coord: Coordinate, payload: &Payload) -> RequestOutcome {
        let path = format!("/api/{}/{}", coord.x, coord.y);

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => {
                let message = format!("POST {path} - encode payload: {err}");
                warn!("{message}");
                return RequestOutcome::Failure(FailureKind::Encoding { message });
            }
        };

        let response = match self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let suppressed = is_port_exhaustion(&err);
                let message = format!("POST {path} - {err}");
                if suppressed {
                    // Expected under sustained concurrency; counter only.
                    trace!(target: "bombard::suppressed", "{message}");
                } else {
                    warn!("{message}");
                }
                return RequestOutcome::Failure(FailureKind::Network {
                    message,
                    suppressed,
                });
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = match response.text().await {
                Ok(body) => truncate_for_diagnostics(body),
                Err(err) => format!("<failed to read body: {err}>"),
            };
            let message = format!("POST {path} - status={} body={}", status.as_u16(), body);
            warn!("{message}");
            return RequestOutcome::Failure(FailureKind::Protocol {
                status: status.as_u16(),
                message,
            });
        }

        debug_assert!(status < StatusCode::BAD_REQUEST);
        RequestOutcome::Success
    }
}

/// Detect local ephemeral-port exhaustion (EADDRNOTAVAIL) anywhere in the
/// error source chain.
fn is_port_exhaustion(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::AddrNotAvailable {
                return true;
            }
        }
        if current.to_string().contains("assign requested address") {
            return true;
        }
        source = current.source();
    }
    false
}

fn truncate_for_diagnostics(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_detection_only_marks_network_failures() {
        let network = FailureKind::Network {
            message: "POST /api/1/2 - connect: cannot assign requested address".into(),
            suppressed: true,
        };
        assert!(network.suppressed());

        let protocol = FailureKind::Protocol {
            status: 503,
            message: "POST /api/1/2 - status=503 body=busy".into(),
        };
        assert!(!protocol.suppressed());
    }

    #[test]
    fn truncation_is_bounded_and_char_safe() {
        let long = "é".repeat(MAX_ERROR_BODY_BYTES); // 2 bytes per char
        let out = truncate_for_diagnostics(long);
        assert!(out.len() <= MAX_ERROR_BODY_BYTES + 3);
        assert!(out.ends_with("..."));

        let short = truncate_for_diagnostics("boom".into());
        assert_eq!(short, "boom");
    }

    #[test]
    fn protocol_message_carries_status_and_body() {
        let kind = FailureKind::Protocol {
            status: 500,
            message: "POST /api/3/4 - status=500 body=boom".into(),
        };
        assert!(kind.message().contains("status=500"));
        assert!(kind.message().contains("boom"));
    }
}

//! Blocking HTTP/JSON transport for the request builder.

use crate::datasource::Transport;
use crate::error::{GridError, GridResult};
use crate::model::{RowsRequest, RowsResponse};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// POSTs requests to `<endpoint>/rows` on a running `gridrows serve`.
pub struct HttpTransport {
    agent: ureq::Agent,
    rows_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            rows_url: format!("{}/rows", endpoint.trim_end_matches('/')),
        }
    }

    pub fn rows_url(&self) -> &str {
        &self.rows_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RowsRequest) -> GridResult<RowsResponse> {
        let body = serde_json::to_string(request)
            .map_err(|e| GridError::transport(format!("cannot encode request: {}", e)))?;
        debug!(url = %self.rows_url, "sending row request");

        let response = self
            .agent
            .post(&self.rows_url)
            .set("Content-Type", "application/json")
            .send_string(&body);

        match response {
            Ok(response) => {
                let text = response
                    .into_string()
                    .map_err(|e| GridError::transport(format!("cannot read response: {}", e)))?;
                serde_json::from_str(&text)
                    .map_err(|e| GridError::transport(format!("cannot decode response: {}", e)))
            }
            Err(ureq::Error::Status(status, response)) => {
                let message = response
                    .into_string()
                    .ok()
                    .and_then(|text| serde_json::from_str::<ErrorBody>(&text).ok())
                    .map(|body| body.error)
                    .unwrap_or_else(|| format!("server responded with status {}", status));
                Err(error_for_status(status, message))
            }
            Err(ureq::Error::Transport(e)) => Err(GridError::transport(e.to_string())),
        }
    }
}

/// Map an HTTP status back to the error kind the server reported.
pub fn error_for_status(status: u16, message: String) -> GridError {
    match status {
        400 | 422 => GridError::Validation(message),
        // Gateway statuses: the server could not reach what it depends on
        502..=504 => GridError::Transport(message),
        500..=599 => GridError::QueryExecution(message),
        _ => GridError::Transport(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_url() {
        assert_eq!(
            HttpTransport::new("http://localhost:5000/").rows_url(),
            "http://localhost:5000/rows"
        );
        assert_eq!(
            HttpTransport::new("http://localhost:5000").rows_url(),
            "http://localhost:5000/rows"
        );
    }

    #[test]
    fn test_error_for_status() {
        assert!(matches!(
            error_for_status(400, "bad".into()),
            GridError::Validation(_)
        ));
        assert!(matches!(
            error_for_status(500, "boom".into()),
            GridError::QueryExecution(_)
        ));
        assert!(matches!(
            error_for_status(404, "missing".into()),
            GridError::Transport(_)
        ));
        assert!(matches!(
            error_for_status(501, "not implemented".into()),
            GridError::QueryExecution(_)
        ));
        for status in [502, 503, 504] {
            assert!(matches!(
                error_for_status(status, "upstream".into()),
                GridError::Transport(_)
            ));
        }
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_server_error_kinds_survive_the_round_trip() {
        use axum::response::IntoResponse;

        for error in [
            GridError::validation("startRow must not be negative"),
            GridError::query("column not found"),
            GridError::transport("upstream unreachable"),
        ] {
            let status = error.clone().into_response().status().as_u16();
            let back = error_for_status(status, error.message().to_string());
            assert_eq!(back, error);
        }
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) is not served on test machines
        let transport = HttpTransport::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));
        let result = transport.send(&RowsRequest::default());
        assert!(matches!(result, Err(GridError::Transport(_))));
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Terminal failure of a single outbound backend call.
///
/// Classification matters: a timed-out call must never be reported as
/// unreachable, they map to different gateway statuses (504 vs 502).
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("backend request timed out: {0}")]
    TimedOut(#[source] reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::TimedOut(err)
        } else {
            UpstreamError::Unreachable(err)
        }
    }
}

impl UpstreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            UpstreamError::Unreachable(_) => "Backend unreachable",
            UpstreamError::TimedOut(_) => "Backend request timed out",
        }
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Why a token-rotation attempt failed. Every variant ends the same way for
/// the caller (cookies cleared, original 401 passed through); the distinction
/// only feeds the logs.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("refresh call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("refresh endpoint returned {0}")]
    Status(StatusCode),

    #[error("refresh response lacked a string access_token field")]
    MalformedResponse,
}

/// Request-level outcome, logged once per proxied request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOutcome {
    Passthrough,
    ErrorPassthrough,
    RotatedPassthrough,
    AuthCleared,
    Unreachable,
    TimedOut,
}

impl ProxyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyOutcome::Passthrough => "passthrough",
            ProxyOutcome::ErrorPassthrough => "error_passthrough",
            ProxyOutcome::RotatedPassthrough => "rotated_passthrough",
            ProxyOutcome::AuthCleared => "auth_cleared",
            ProxyOutcome::Unreachable => "unreachable",
            ProxyOutcome::TimedOut => "timed_out",
        }
    }

    /// Backend 4xx/5xx passthroughs get their own label in the logs
    pub fn passthrough(status: StatusCode) -> Self {
        if status.is_client_error() || status.is_server_error() {
            ProxyOutcome::ErrorPassthrough
        } else {
            ProxyOutcome::Passthrough
        }
    }

    pub fn from_error(err: &UpstreamError) -> Self {
        match err {
            UpstreamError::Unreachable(_) => ProxyOutcome::Unreachable,
            UpstreamError::TimedOut(_) => ProxyOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ProxyOutcome::Passthrough.as_str(), "passthrough");
        assert_eq!(ProxyOutcome::ErrorPassthrough.as_str(), "error_passthrough");
        assert_eq!(ProxyOutcome::RotatedPassthrough.as_str(), "rotated_passthrough");
        assert_eq!(ProxyOutcome::AuthCleared.as_str(), "auth_cleared");
        assert_eq!(ProxyOutcome::Unreachable.as_str(), "unreachable");
        assert_eq!(ProxyOutcome::TimedOut.as_str(), "timed_out");
    }

    #[test]
    fn test_passthrough_classification() {
        assert_eq!(
            ProxyOutcome::passthrough(StatusCode::OK),
            ProxyOutcome::Passthrough
        );
        assert_eq!(
            ProxyOutcome::passthrough(StatusCode::CREATED),
            ProxyOutcome::Passthrough
        );
        assert_eq!(
            ProxyOutcome::passthrough(StatusCode::NOT_FOUND),
            ProxyOutcome::ErrorPassthrough
        );
        assert_eq!(
            ProxyOutcome::passthrough(StatusCode::SERVICE_UNAVAILABLE),
            ProxyOutcome::ErrorPassthrough
        );
    }
}

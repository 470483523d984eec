// Upstream client implementation
// HTTP client wrapper for the backend API

use axum::http::Method;
use bytes::Bytes;
use reqwest::{header, Client, Response};
use serde_json::{json, Value};
use tokio::time::Duration;

use crate::proxy::error::{RefreshError, UpstreamError};

/// Versioned API prefix every forwarded path is mounted under
const API_PREFIX: &str = "/api/v1";
const REFRESH_PATH: &str = "auth/refresh";

pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(backend_url: &str) -> Self {
        let http_client = Client::builder()
            // Connection settings (optimize connection reuse, reduce overhead)
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: backend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build backend URL: {base}/api/v1/{path}, original query string preserved
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(qs) if !qs.is_empty() => {
                format!("{}{}/{}?{}", self.base_url, API_PREFIX, path, qs)
            }
            _ => format!("{}{}/{}", self.base_url, API_PREFIX, path),
        }
    }

    /// Forward a browser request to the backend under its own deadline.
    ///
    /// Outbound headers are reduced to the forwarded content-type plus the
    /// bearer credential; nothing else from the inbound request crosses over.
    /// A missing access token is valid, the call goes out anonymous.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        content_type: Option<&header::HeaderValue>,
        body: Option<Bytes>,
        access_token: Option<&str>,
        deadline: Duration,
    ) -> Result<Response, UpstreamError> {
        let url = self.build_url(path, query);

        let mut headers = header::HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, ct.clone());
        }
        if let Some(token) = access_token {
            match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => {
                    // A tampered cookie is not a transport failure; send the
                    // call anonymous and let the backend reject it
                    tracing::warn!("access_token cookie is not a valid header value, dropping it");
                }
            }
        }

        let mut request = self
            .http_client
            .request(method, &url)
            .headers(headers)
            .timeout(deadline);

        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(UpstreamError::from)?;
        Ok(response)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// One call, fixed deadline. Any failure mode (network, timeout, non-2xx,
    /// response without a string `access_token`) is terminal for the rotation.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        deadline: Duration,
    ) -> Result<String, RefreshError> {
        let url = self.build_url(REFRESH_PATH, None);

        let response = self
            .http_client
            .post(&url)
            .timeout(deadline)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                RefreshError::MalformedResponse
            } else {
                RefreshError::Upstream(e.into())
            }
        })?;

        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(RefreshError::MalformedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let client = UpstreamClient::new("http://localhost:8000");

        let url1 = client.build_url("documents/search", None);
        assert_eq!(url1, "http://localhost:8000/api/v1/documents/search");

        let url2 = client.build_url("documents/search", Some("q=rust&limit=5"));
        assert_eq!(
            url2,
            "http://localhost:8000/api/v1/documents/search?q=rust&limit=5"
        );
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let client = UpstreamClient::new("http://localhost:8000/");
        assert_eq!(
            client.build_url("auth/refresh", None),
            "http://localhost:8000/api/v1/auth/refresh"
        );
    }

    #[test]
    fn test_build_url_ignores_empty_query() {
        let client = UpstreamClient::new("http://localhost:8000");
        assert_eq!(
            client.build_url("chat", Some("")),
            "http://localhost:8000/api/v1/chat"
        );
    }
}

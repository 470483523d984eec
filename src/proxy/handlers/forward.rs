// Authenticating proxy handler
//
// Forwards /api/proxy/{path} to the backend with the bearer credential from
// the request's own cookie jar, rotates the credential at most once on 401,
// and rewrites cookie state based on the outcome. Tokens never leave the
// transport layer and are never cached across requests.

use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::proxy::cookies::{access_cookie, clear_auth_cookies, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::proxy::error::{ProxyOutcome, UpstreamError};
use crate::proxy::server::AppState;

/// Backend response buffered for passthrough
struct BackendReply {
    status: StatusCode,
    content_type: Option<header::HeaderValue>,
    content_disposition: Option<header::HeaderValue>,
    body: Bytes,
}

impl BackendReply {
    /// Passthrough with header minimization: only content-type and
    /// content-disposition survive, everything else the backend sent stays
    /// internal
    fn into_response(self) -> Response {
        let mut builder = Response::builder().status(self.status);
        if let Some(ct) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        if let Some(cd) = self.content_disposition {
            builder = builder.header(header::CONTENT_DISPOSITION, cd);
        }
        builder
            .body(Body::from(self.body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Drain a backend response into memory; body-read failures are classified
/// through the same unreachable/timed-out taxonomy as the send itself
async fn read_reply(response: reqwest::Response) -> Result<BackendReply, UpstreamError> {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let content_disposition = response.headers().get(header::CONTENT_DISPOSITION).cloned();
    let body = response.bytes().await.map_err(UpstreamError::from)?;
    Ok(BackendReply {
        status,
        content_type,
        content_disposition,
        body,
    })
}

/// File uploads get a longer deadline; everything else runs on the short one
fn is_multipart(content_type: Option<&header::HeaderValue>) -> bool {
    content_type
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            s.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

fn log_outcome(outcome: ProxyOutcome, method: &Method, path: &str, status: Option<StatusCode>) {
    match status {
        Some(status) => info!(
            "{} /api/proxy/{} -> {} ({})",
            method,
            path,
            status,
            outcome.as_str()
        ),
        None => warn!("{} /api/proxy/{} -> {}", method, path, outcome.as_str()),
    }
}

/// Handle GET|POST|PUT|DELETE|PATCH /api/proxy/{path...}
pub async fn handle_proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let secure = state.config.secure_cookies;
    let content_type = headers.get(header::CONTENT_TYPE).cloned();
    let deadline = if is_multipart(content_type.as_ref()) {
        state.config.upload_deadline()
    } else {
        state.config.request_deadline()
    };

    let access_token = jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
    let refresh_token = jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

    // Body is buffered, not streamed; GET/HEAD carry none
    let body = if method == Method::GET || method == Method::HEAD || body.is_empty() {
        None
    } else {
        Some(body)
    };

    debug!(
        "forwarding {} /api/proxy/{} (token: {}, deadline: {:?})",
        method,
        path,
        access_token.is_some(),
        deadline
    );

    let first = match state
        .upstream
        .forward(
            method.clone(),
            &path,
            query.as_deref(),
            content_type.as_ref(),
            body.clone(),
            access_token.as_deref(),
            deadline,
        )
        .await
    {
        Ok(response) => response,
        Err(e) => {
            log_outcome(ProxyOutcome::from_error(&e), &method, &path, None);
            return e.into_response();
        }
    };

    if first.status() == StatusCode::UNAUTHORIZED {
        return rotate_and_retry(
            state,
            method,
            path,
            query,
            content_type,
            body,
            refresh_token,
            jar,
            deadline,
            first,
        )
        .await;
    }

    let reply = match read_reply(first).await {
        Ok(reply) => reply,
        Err(e) => {
            log_outcome(ProxyOutcome::from_error(&e), &method, &path, None);
            return e.into_response();
        }
    };

    // 403 signals an authorization failure a refresh cannot fix; force the
    // client into a clean logout
    if reply.status == StatusCode::FORBIDDEN {
        log_outcome(ProxyOutcome::AuthCleared, &method, &path, Some(reply.status));
        return (clear_auth_cookies(jar, secure), reply.into_response()).into_response();
    }

    log_outcome(
        ProxyOutcome::passthrough(reply.status),
        &method,
        &path,
        Some(reply.status),
    );
    reply.into_response()
}

/// The 401 branch: at most one refresh, at most one retry, exactly in this
/// order. A second 401 after rotation is passed through untouched.
#[allow(clippy::too_many_arguments)]
async fn rotate_and_retry(
    state: AppState,
    method: Method,
    path: String,
    query: Option<String>,
    content_type: Option<header::HeaderValue>,
    body: Option<Bytes>,
    refresh_token: Option<String>,
    jar: CookieJar,
    deadline: Duration,
    first: reqwest::Response,
) -> Response {
    let secure = state.config.secure_cookies;

    // Buffer the original 401 up front; every unrecoverable branch below
    // passes it through verbatim
    let original = match read_reply(first).await {
        Ok(reply) => reply,
        Err(e) => {
            log_outcome(ProxyOutcome::from_error(&e), &method, &path, None);
            return e.into_response();
        }
    };

    let Some(refresh_token) = refresh_token else {
        debug!("401 without refresh token, clearing credentials");
        log_outcome(ProxyOutcome::AuthCleared, &method, &path, Some(original.status));
        return (clear_auth_cookies(jar, secure), original.into_response()).into_response();
    };

    let new_token = match state
        .upstream
        .refresh(&refresh_token, state.config.refresh_deadline())
        .await
    {
        Ok(token) => token,
        Err(e) => {
            warn!("token refresh failed: {}", e);
            log_outcome(ProxyOutcome::AuthCleared, &method, &path, Some(original.status));
            return (clear_auth_cookies(jar, secure), original.into_response()).into_response();
        }
    };

    // The rotated token is known valid; stamp the cookie before the retry so
    // it survives even a retry that then fails
    let jar = jar.add(access_cookie(new_token.clone(), secure));

    let retry = match state
        .upstream
        .forward(
            method.clone(),
            &path,
            query.as_deref(),
            content_type.as_ref(),
            body,
            Some(&new_token),
            deadline,
        )
        .await
    {
        Ok(response) => response,
        Err(e) => {
            log_outcome(ProxyOutcome::from_error(&e), &method, &path, None);
            return (jar, e).into_response();
        }
    };

    let reply = match read_reply(retry).await {
        Ok(reply) => reply,
        Err(e) => {
            log_outcome(ProxyOutcome::from_error(&e), &method, &path, None);
            return (jar, e).into_response();
        }
    };

    if reply.status == StatusCode::FORBIDDEN {
        log_outcome(ProxyOutcome::AuthCleared, &method, &path, Some(reply.status));
        return (clear_auth_cookies(jar, secure), reply.into_response()).into_response();
    }

    log_outcome(
        ProxyOutcome::RotatedPassthrough,
        &method,
        &path,
        Some(reply.status),
    );
    (jar, reply.into_response()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_value(s: &str) -> header::HeaderValue {
        header::HeaderValue::from_str(s).unwrap()
    }

    #[test]
    fn test_multipart_detection() {
        let ct = header_value("multipart/form-data; boundary=----x");
        assert!(is_multipart(Some(&ct)));

        let ct = header_value("MULTIPART/FORM-DATA");
        assert!(is_multipart(Some(&ct)));

        let ct = header_value("application/json");
        assert!(!is_multipart(Some(&ct)));

        assert!(!is_multipart(None));
    }

    #[test]
    fn test_reply_header_minimization() {
        let reply = BackendReply {
            status: StatusCode::OK,
            content_type: Some(header_value("application/json")),
            content_disposition: Some(header_value("attachment; filename=\"a.pdf\"")),
            body: Bytes::from_static(b"{}"),
        };
        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"a.pdf\""
        );
        // Nothing beyond the two forwarded headers
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn test_reply_without_optional_headers() {
        let reply = BackendReply {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            content_disposition: None,
            body: Bytes::new(),
        };
        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}

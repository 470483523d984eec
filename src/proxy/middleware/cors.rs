use axum::http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS layer for the gateway.
///
/// The browser sends credential cookies with every call, so the wildcard
/// origin is off the table; the requesting origin is mirrored back instead.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
}

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::proxy::handlers::handle_proxy;
use crate::proxy::middleware;
use crate::proxy::upstream::client::UpstreamClient;
use crate::proxy::GatewayConfig;

/// Axum application state.
///
/// Deliberately holds no mutable credential store: tokens live only in each
/// request's cookie jar, so concurrent requests share nothing.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let upstream = Arc::new(UpstreamClient::new(&config.backend_url));
        Self {
            upstream,
            config: Arc::new(config),
        }
    }
}

/// Build the gateway router; separated from `start` so tests can drive it
/// directly through `tower::ServiceExt`
pub fn build_router(state: AppState) -> Router {
    let proxy = get(handle_proxy)
        .post(handle_proxy)
        .put(handle_proxy)
        .delete(handle_proxy)
        .patch(handle_proxy);

    Router::new()
        .route("/healthz", get(health_check_handler))
        .route("/api/proxy/*path", proxy)
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .with_state(state)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AxumServer {
    /// Start the gateway server
    pub async fn start(
        host: String,
        port: u16,
        config: GatewayConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let app = build_router(AppState::new(config));

        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("Failed to bind address {}: {}", addr, e))?;

        tracing::info!("Gateway server started at http://{}", addr);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
        };

        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway server stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}

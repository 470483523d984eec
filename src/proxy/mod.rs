// proxy module - authenticating BFF reverse proxy

pub mod config;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::{ProxyOutcome, RefreshError, UpstreamError};
pub use server::{AppState, AxumServer};
pub use upstream::client::UpstreamClient;

// Middleware module - axum middleware

pub mod cors;

pub use cors::cors_layer;

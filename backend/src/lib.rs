//! Dance Studio Management Platform - server library
//!
//! Multi-tenant back office, instructor portal and parent portal for dance
//! and arts studios: classes, enrollments, attendance, tuition billing and
//! family messaging. The binary and the integration tests both build the
//! router from here.

use axum::{http::Request, middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod background;
pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::Config;

use external::{Notifier, PaymentProviderClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub payments: PaymentProviderClient,
    pub notifier: Arc<dyn Notifier>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            studio = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::tenant_middleware,
        ))
        .layer(trace)
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Dance Studio Management Platform API v1.0"
}

use std::sync::Arc;

use axum::{
    http::{header, request::Parts, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::ApiState;

pub const LOCAL_FRONTEND_ORIGIN: &str = "http://localhost:3000";

pub fn create_router(state: Arc<ApiState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(state.config.development));

    Router::new()
        .route(
            "/api/subscription/agents/limit/get",
            post(handlers::get_agent_limit),
        )
        .route(
            "/api/subscription/agents/limit",
            post(handlers::update_agent_limit),
        )
        .route(
            "/api/subscription/agents/used",
            post(handlers::update_used_agent),
        )
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(middleware)
}

/// Local frontend only; development mode accepts any plain-http origin.
fn cors_layer(development: bool) -> CorsLayer {
    let origins = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        origin == LOCAL_FRONTEND_ORIGIN || (development && origin.starts_with("http://"))
    });

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use subscription_service::storage::{
    ConnectionConfig, Document, Filter, InsertResult, MemoryGateway, StoreError, Update,
    UpdateResult,
};
use subscription_service::{
    create_router, AgentLimitResponse, ApiState, GatewayFactory, MemoryStore, StoreGateway,
    SubscriptionConfig,
};
use tower::ServiceExt;

fn app(store: &MemoryStore, development: bool) -> Router {
    let config = SubscriptionConfig {
        development,
        ..SubscriptionConfig::default()
    };
    create_router(Arc::new(ApiState::new(Arc::new(store.clone()), config)))
}

fn seeded_store() -> MemoryStore {
    MemoryStore::with_documents([
        json!({
            "company_id": "acme",
            "grandfathered": false,
            "agents": {"limit": 5, "used": 3},
            "projects": {"limit": 1, "used": 0}
        }),
        json!({
            "company_id": "legacy",
            "grandfathered": true,
            "agents": {"limit": 12, "used": 4}
        }),
    ])
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_get_agent_limit_over_http() {
    let store = seeded_store();

    let (status, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/limit/get",
        json!({"company_id": "legacy"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"limit": 12, "used": 4, "grandfathered": true})
    );
}

#[tokio::test]
async fn test_update_agent_limit_returns_clamped_value() {
    let store = seeded_store();

    let (status, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/limit",
        json!({"company_id": "acme", "limit": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: AgentLimitResponse = serde_json::from_value(body).unwrap();
    assert!(!response.is_failure());
    assert_eq!(response.limit, 2);
    assert_eq!(response.used, 0);
}

#[tokio::test]
async fn test_update_used_agent_over_http() {
    let store = seeded_store();

    let (_, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/used",
        json!({"company_id": "acme", "used": 9}),
    )
    .await;

    assert_eq!(body, json!({"limit": 5, "used": 9}));
}

#[tokio::test]
async fn test_failures_are_reported_in_status_with_ok() {
    let store = seeded_store();

    let (status, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/limit/get",
        json!({"company_id": "ghost"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: AgentLimitResponse = serde_json::from_value(body).unwrap();
    assert!(response.is_failure());
    assert_eq!(response.limit, 0);
    assert_eq!(response.used, 0);
    assert_eq!(response.grandfathered, None);
    assert!(response
        .status
        .as_deref()
        .is_some_and(|status| status.contains("ghost")));
}

#[tokio::test]
async fn test_store_outage_is_reported_in_status() {
    let store = seeded_store();
    store.fail_connect(true);

    let (status, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/used",
        json!({"company_id": "acme", "used": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: AgentLimitResponse = serde_json::from_value(body).unwrap();
    assert!(response.is_failure());
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_empty_company_id_is_reported_in_status() {
    let store = seeded_store();

    let (_, body) = post_json(
        app(&store, false),
        "/api/subscription/agents/limit",
        json!({"company_id": "", "limit": 4}),
    )
    .await;

    let response: AgentLimitResponse = serde_json::from_value(body).unwrap();
    assert!(response.is_failure());
    assert_eq!(store.connect_count(), 0);
}

#[tokio::test]
async fn test_health_check() {
    let store = MemoryStore::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app(&store, false).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "subscription-service");
}

/// Hands out gateways whose `find_one` never completes.
struct StalledStore(MemoryStore);

struct StalledGateway(MemoryGateway);

impl GatewayFactory for StalledStore {
    fn create(&self) -> Box<dyn StoreGateway> {
        Box::new(StalledGateway(self.0.gateway()))
    }
}

#[async_trait]
impl StoreGateway for StalledGateway {
    async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), StoreError> {
        self.0.connect(config).await
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        self.0.disconnect().await
    }

    async fn find_one(&mut self, _filter: &Filter) -> Result<Document, StoreError> {
        std::future::pending().await
    }

    async fn update_one(
        &mut self,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.0.update_one(filter, update).await
    }

    async fn insert_one(&mut self, document: Document) -> Result<InsertResult, StoreError> {
        self.0.insert_one(document).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_long_store_timeout_still_answers_with_status() {
    let store = seeded_store();
    let config = SubscriptionConfig {
        store_timeout_secs: 60,
        ..SubscriptionConfig::default()
    };
    assert!(config.validate().is_ok());
    let app = create_router(Arc::new(ApiState::new(
        Arc::new(StalledStore(store.clone())),
        config,
    )));

    let (status, body) = post_json(
        app,
        "/api/subscription/agents/limit/get",
        json!({"company_id": "acme"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: AgentLimitResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.status.as_deref(), Some("operation deadline exceeded"));
    assert_eq!(store.disconnect_count(), 1);
}

async fn preflight_allow_origin(development: bool, origin: &str) -> Option<String> {
    let store = MemoryStore::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/subscription/agents/limit/get")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app(&store, development).oneshot(request).await.unwrap();
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_cors_allows_local_frontend() {
    assert_eq!(
        preflight_allow_origin(false, "http://localhost:3000").await.as_deref(),
        Some("http://localhost:3000")
    );
}

#[tokio::test]
async fn test_cors_development_mode_allows_any_http_origin() {
    assert_eq!(
        preflight_allow_origin(false, "http://dev.example:8080").await,
        None
    );
    assert_eq!(
        preflight_allow_origin(true, "http://dev.example:8080").await.as_deref(),
        Some("http://dev.example:8080")
    );
}

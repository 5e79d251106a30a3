use std::future::Future;
use std::sync::Arc;

use axum::{extract::State, Json};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::limits::{LimitError, LimitService, RequestContext};

use super::types::{
    AgentLimitResponse, GetAgentLimitRequest, HealthResponse, UpdateAgentLimitRequest,
    UpdateUsedAgentRequest,
};
use super::ApiState;

pub const SERVICE_NAME: &str = "subscription-service";

pub async fn get_agent_limit(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<GetAgentLimitRequest>,
) -> Json<AgentLimitResponse> {
    let company_id = request.company_id;
    let response = run_operation(&state, "get_agent_limit", move |mut service| async move {
        service
            .get_agent_limit(&company_id)
            .await
            .map(AgentLimitResponse::from)
    })
    .await;

    Json(response)
}

pub async fn update_agent_limit(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UpdateAgentLimitRequest>,
) -> Json<AgentLimitResponse> {
    let UpdateAgentLimitRequest { company_id, limit } = request;
    let response = run_operation(&state, "update_agent_limit", move |mut service| async move {
        service
            .update_agent_limit(&company_id, limit)
            .await
            .map(AgentLimitResponse::from)
    })
    .await;

    Json(response)
}

pub async fn update_used_agent(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UpdateUsedAgentRequest>,
) -> Json<AgentLimitResponse> {
    let UpdateUsedAgentRequest { company_id, used } = request;
    let response = run_operation(&state, "update_used_agent", move |mut service| async move {
        service
            .update_used_agent(&company_id, used)
            .await
            .map(AgentLimitResponse::from)
    })
    .await;

    Json(response)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Runs one operation on its own task with a request-scoped service.
///
/// Dropping the handler future (client went away) cancels the context, and
/// the spawned task still releases its store session before exiting.
async fn run_operation<F, Fut>(
    state: &ApiState,
    operation: &'static str,
    work: F,
) -> AgentLimitResponse
where
    F: FnOnce(LimitService) -> Fut,
    Fut: Future<Output = Result<AgentLimitResponse, LimitError>> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let ctx = RequestContext::with_timeout(state.config.store_timeout()).with_cancellation(cancel);
    let service = state.limit_service(ctx);

    match tokio::spawn(work(service)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            warn!(operation, error = %err, "agent operation failed");
            AgentLimitResponse::failure(err.to_string())
        }
        Err(err) => {
            error!(operation, error = %err, "agent operation task failed");
            AgentLimitResponse::failure(format!("internal error: {err}"))
        }
    }
}

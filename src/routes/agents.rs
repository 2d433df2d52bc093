use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    access::Actor,
    dto::agents::SetAgentStatusRequest,
    error::AppResult,
    models::{AgentSession, WorkloadSummary},
    response::ApiResponse,
    services::{agent_service, assignment_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", post(set_status))
        .route("/workload", get(workload))
}

#[utoipa::path(
    post,
    path = "/api/agents/status",
    request_body = SetAgentStatusRequest,
    responses(
        (status = 200, description = "Availability updated", body = ApiResponse<AgentSession>),
        (status = 403, description = "Call center staff only"),
    ),
    tag = "Assignment"
)]
pub async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<SetAgentStatusRequest>,
) -> AppResult<Json<ApiResponse<AgentSession>>> {
    Ok(Json(agent_service::set_status(&state, &actor, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/agents/workload",
    responses(
        (status = 200, description = "Today's workload per agent", body = ApiResponse<WorkloadSummary>),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Assignment"
)]
pub async fn workload(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<WorkloadSummary>>> {
    Ok(Json(assignment_service::workload_summary(&state, &actor).await?))
}

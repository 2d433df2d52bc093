use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};

use crate::{
    access::Actor,
    dto::audit::AuditLogList,
    error::AppResult,
    response::ApiResponse,
    routes::{orders::csv_attachment, params::AuditLogQuery},
    services::audit_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/export", get(export_audit_logs))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit log, newest first", body = ApiResponse<AuditLogList>),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<ApiResponse<AuditLogList>>> {
    Ok(Json(audit_service::list_audit_logs(&state, &actor, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs/export",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Audit"
)]
pub async fn export_audit_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<impl IntoResponse> {
    let body = audit_service::export_audit_logs(&state, &actor, query).await?;
    Ok(csv_attachment("audit_logs.csv", body))
}

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    access::Actor,
    dto::orders::{
        AssignAgentRequest, BalanceResult, CreateOrderRequest, DistributionResult, OrderDetail,
        OrderItemInput, OrderList, StatusChangeRequest, UpdateOrderRequest, WorkflowAdvanceRequest,
    },
    error::{AppError, AppResult},
    import::ImportReport,
    models::{Order, OrderAssignment},
    response::ApiResponse,
    routes::params::{DistributeQuery, ImportQuery, OrderListQuery},
    services::{assignment_service, import_service, order_service, workflow_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/export", get(export_orders))
        .route("/import", post(import_orders))
        .route("/distribute", post(distribute_orders))
        .route("/balance", post(balance_orders))
        .route("/{id}", get(get_order).patch(update_order).delete(delete_order))
        .route("/{id}/status", axum::routing::patch(change_status))
        .route("/{id}/workflow", post(advance_workflow))
        .route("/{id}/assign", post(assign_agent))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{item_id}", delete(remove_item))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders visible to the caller", body = ApiResponse<OrderList>),
        (status = 403, description = "Caller sees no orders"),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_orders(&state, &actor, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<Order>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let created = order_service::create_order(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items, history and assignment", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    Ok(Json(order_service::get_order(&state, &actor, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(order_service::update_order(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(order_service::delete_order(&state, &actor, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Order>),
        (status = 400, description = "Missing required field"),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Invalid transition"),
    ),
    tag = "Orders"
)]
pub async fn change_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChangeRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(workflow_service::transition_status(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/workflow",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = WorkflowAdvanceRequest,
    responses(
        (status = 200, description = "Workflow advanced", body = ApiResponse<Order>),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Invalid transition"),
    ),
    tag = "Orders"
)]
pub async fn advance_workflow(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<WorkflowAdvanceRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(workflow_service::advance_workflow(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/assign",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AssignAgentRequest,
    responses(
        (status = 200, description = "Agent assigned", body = ApiResponse<OrderAssignment>),
        (status = 400, description = "Not an active call center agent"),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Assignment"
)]
pub async fn assign_agent(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignAgentRequest>,
) -> AppResult<Json<ApiResponse<OrderAssignment>>> {
    Ok(Json(assignment_service::reassign(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/distribute",
    params(DistributeQuery),
    responses(
        (status = 200, description = "Unassigned orders distributed", body = ApiResponse<DistributionResult>),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "No agents available"),
    ),
    tag = "Assignment"
)]
pub async fn distribute_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<DistributeQuery>,
) -> AppResult<Json<ApiResponse<DistributionResult>>> {
    let policy = query.policy.unwrap_or_default();
    Ok(Json(assignment_service::distribute(&state, &actor, policy).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/balance",
    responses(
        (status = 200, description = "Today's workload rebalanced", body = ApiResponse<BalanceResult>),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Assignment"
)]
pub async fn balance_orders(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<BalanceResult>>> {
    Ok(Json(assignment_service::balance(&state, &actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = OrderItemInput,
    responses(
        (status = 200, description = "Item added", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Orders"
)]
pub async fn add_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderItemInput>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    Ok(Json(order_service::append_item(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("item_id" = Uuid, Path, description = "Order item ID"),
    ),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Item not found"),
    ),
    tag = "Orders"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    Ok(Json(order_service::remove_item(&state, &actor, id, item_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/export",
    params(OrderListQuery),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Orders"
)]
pub async fn export_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> AppResult<impl IntoResponse> {
    let body = order_service::export_orders(&state, &actor, query).await?;
    Ok(csv_attachment("orders.csv", body))
}

pub(crate) fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

#[utoipa::path(
    post,
    path = "/api/orders/import",
    params(ImportQuery),
    request_body(content = String, content_type = "text/csv", description = "CSV file, raw or as the `file` part of a multipart form"),
    responses(
        (status = 200, description = "Import report", body = ApiResponse<ImportReport>),
        (status = 400, description = "Unreadable file or missing essential columns"),
        (status = 403, description = "Permission denied"),
    ),
    tag = "Orders"
)]
pub async fn import_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ImportQuery>,
    request: Request,
) -> AppResult<Json<ApiResponse<ImportReport>>> {
    let (upload, form_seller) = read_upload(request, &state).await?;
    let seller_id = form_seller.or(query.seller_id);
    Ok(Json(
        import_service::import_orders(&state, &actor, &upload, seller_id).await?,
    ))
}

/// The CSV bytes plus an optional `seller_id` form field.
async fn read_upload(request: Request, state: &AppState) -> AppResult<(Vec<u8>, Option<Uuid>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| AppError::validation("file", e.body_text()))?;
        return Ok((body.to_vec(), None));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::validation("file", e.body_text()))?;
    let mut file = None;
    let mut seller_id = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation("file", e.body_text()))?
    {
        match field.name() {
            Some("seller_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation("seller_id", e.body_text()))?;
                if !text.trim().is_empty() {
                    seller_id = Some(
                        Uuid::parse_str(text.trim())
                            .map_err(|_| AppError::validation("seller_id", "must be a UUID"))?,
                    );
                }
            }
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation("file", e.body_text()))?;
                file = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    let file = file.ok_or_else(|| AppError::validation("file", "is required"))?;
    Ok((file, seller_id))
}

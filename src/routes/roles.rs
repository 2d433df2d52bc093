use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    access::Actor,
    dto::roles::{
        CreatePermissionRequest, CreateRoleRequest, PermissionList, RoleList,
        RolePermissionsResult, SetRolePermissionsRequest, UpdateRoleRequest,
    },
    error::AppResult,
    models::{Permission, Role},
    response::ApiResponse,
    services::role_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/{id}", patch(update_role).delete(delete_role))
        .route("/{id}/permissions", post(set_role_permissions))
}

pub fn permission_router() -> Router<AppState> {
    Router::new().route("/", get(list_permissions).post(create_permission))
}

#[utoipa::path(
    get,
    path = "/api/roles",
    responses(
        (status = 200, description = "Roles with member and permission counts", body = ApiResponse<RoleList>)
    ),
    tag = "Roles"
)]
pub async fn list_roles(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<RoleList>>> {
    Ok(Json(role_service::list_roles(&state, &actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<Role>),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Roles"
)]
pub async fn create_role(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Role>>)> {
    let created = role_service::create_role(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<Role>),
        (status = 409, description = "Protected role"),
    ),
    tag = "Roles"
)]
pub async fn update_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<Role>>> {
    Ok(Json(role_service::update_role(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 409, description = "Protected role"),
    ),
    tag = "Roles"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(role_service::delete_role(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = SetRolePermissionsRequest,
    responses(
        (status = 200, description = "Permission set replaced", body = ApiResponse<RolePermissionsResult>),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Roles"
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRolePermissionsRequest>,
) -> AppResult<Json<ApiResponse<RolePermissionsResult>>> {
    Ok(Json(role_service::set_role_permissions(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/permissions",
    responses(
        (status = 200, description = "Permission registry", body = ApiResponse<PermissionList>)
    ),
    tag = "Roles"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<PermissionList>>> {
    Ok(Json(role_service::list_permissions(&state, &actor).await?))
}

#[utoipa::path(
    post,
    path = "/api/permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = ApiResponse<Permission>),
        (status = 400, description = "Unknown permission type"),
    ),
    tag = "Roles"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreatePermissionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Permission>>)> {
    let created = role_service::create_permission(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

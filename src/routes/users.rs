use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
};
use uuid::Uuid;

use crate::{
    access::Actor,
    dto::{
        roles::{AssignRoleRequest, UserRoleList},
        users::{CreateUserRequest, SetActiveRequest, SetApprovalRequest, UserList},
    },
    error::AppResult,
    models::{User, UserRoleBinding},
    response::ApiResponse,
    routes::params::UserQuery,
    services::{role_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", delete(delete_user))
        .route("/{id}/approval", patch(set_approval))
        .route("/{id}/active", patch(set_active))
        .route("/{id}/roles", get(list_user_roles).post(assign_role))
        .route("/{id}/roles/{role_id}", delete(revoke_role))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse<UserList>),
        (status = 403, description = "Admins only"),
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(user_service::list_users(&state, &actor, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created, pending approval", body = ApiResponse<User>),
        (status = 409, description = "Email already registered"),
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let created = user_service::create_user(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/approval",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetApprovalRequest,
    responses(
        (status = 200, description = "Approval recorded", body = ApiResponse<User>)
    ),
    tag = "Users"
)]
pub async fn set_approval(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetApprovalRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::set_approval(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/active",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Activation changed", body = ApiResponse<User>)
    ),
    tag = "Users"
)]
pub async fn set_active(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(user_service::set_active(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(user_service::delete_user(&state, &actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/roles",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Active role bindings", body = ApiResponse<UserRoleList>)
    ),
    tag = "Users"
)]
pub async fn list_user_roles(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserRoleList>>> {
    Ok(Json(role_service::list_user_roles(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/roles",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role bound", body = ApiResponse<UserRoleBinding>),
        (status = 400, description = "Role not active"),
        (status = 403, description = "Super Admin only"),
    ),
    tag = "Users"
)]
pub async fn assign_role(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRoleRequest>,
) -> AppResult<Json<ApiResponse<UserRoleBinding>>> {
    Ok(Json(role_service::assign_role(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/roles/{role_id}",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("role_id" = Uuid, Path, description = "Role ID"),
    ),
    responses(
        (status = 200, description = "Role binding removed"),
        (status = 409, description = "Last Super Admin binding"),
    ),
    tag = "Users"
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(role_service::revoke_role(&state, &actor, id, role_id).await?))
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    access::Actor,
    dto::products::{
        CreateProductRequest, DeletionRequestList, DeletionRequestPayload, ProductList,
        ResolveDeletionRequest, UpdateProductRequest,
    },
    error::AppResult,
    models::{Product, ProductDeletionRequest},
    response::ApiResponse,
    routes::params::{DeletionRequestQuery, ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/{id}", get(get_product).patch(update_product))
        .route("/{id}/approve", post(approve_product))
        .route("/{id}/reject", post(reject_product))
        .route("/{id}/deletion-requests", post(request_deletion))
}

pub fn deletion_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deletion_requests))
        .route("/{id}/resolve", post(resolve_deletion))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_products(&state, &actor, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_product(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Create product", body = ApiResponse<Product>)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let created = product_service::create_product(&state, &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Update product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn update_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::update_product(&state, &actor, id, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product approved", body = ApiResponse<Product>),
        (status = 403, description = "Admins only"),
    ),
    tag = "Products"
)]
pub async fn approve_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::approve_product(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product rejected", body = ApiResponse<Product>),
        (status = 403, description = "Admins only"),
    ),
    tag = "Products"
)]
pub async fn reject_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::reject_product(&state, &actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/deletion-requests",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = DeletionRequestPayload,
    responses(
        (status = 201, description = "Deletion requested", body = ApiResponse<ProductDeletionRequest>),
        (status = 409, description = "A request is already pending"),
    ),
    tag = "Products"
)]
pub async fn request_deletion(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<DeletionRequestPayload>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductDeletionRequest>>)> {
    let created = product_service::request_deletion(&state, &actor, id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/product-deletion-requests",
    params(DeletionRequestQuery),
    responses(
        (status = 200, description = "Deletion requests", body = ApiResponse<DeletionRequestList>)
    ),
    tag = "Products"
)]
pub async fn list_deletion_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<DeletionRequestQuery>,
) -> AppResult<Json<ApiResponse<DeletionRequestList>>> {
    Ok(Json(product_service::list_deletion_requests(&state, &actor, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/product-deletion-requests/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Deletion request ID")
    ),
    request_body = ResolveDeletionRequest,
    responses(
        (status = 200, description = "Request resolved", body = ApiResponse<ProductDeletionRequest>),
        (status = 409, description = "Request already resolved"),
    ),
    tag = "Products"
)]
pub async fn resolve_deletion(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ResolveDeletionRequest>,
) -> AppResult<Json<ApiResponse<ProductDeletionRequest>>> {
    Ok(Json(product_service::resolve_deletion(&state, &actor, id, payload).await?))
}

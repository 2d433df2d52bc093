use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType, extension::postgres::PgExpr},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{self, Actor, ProductFacts, ProductScope},
    audit::{self, AuditEntry, actions},
    dto::products::{
        CreateProductRequest, DeletionDecision, DeletionRequestList, DeletionRequestPayload,
        ProductList, ResolveDeletionRequest, UpdateProductRequest,
    },
    entity::{
        order_items::{self, Entity as OrderItems},
        product_deletion_requests::{
            self, Entity as ProductDeletionRequests, Model as DeletionRequestModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{Product, ProductDeletionRequest},
    notify::{Notice, NotificationKind, NotificationPriority},
    response::{ApiResponse, Meta},
    routes::params::{DeletionRequestQuery, Paged, ProductQuery, ProductSortBy, SortOrder},
    services::notification_service,
    state::AppState,
};

/// `SKU-{unix seconds}-{8 hex, upper}`.
pub fn generate_sku() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("SKU-{}-{}", Utc::now().timestamp(), suffix)
}

fn facts(product: &ProductModel) -> ProductFacts {
    ProductFacts {
        seller_id: product.seller_id,
        is_approved: product.is_approved,
    }
}

fn ensure_price(field: &str, price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::validation(field, "must not be negative"));
    }
    Ok(())
}

pub async fn list_products(
    state: &AppState,
    actor: &Actor,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    match access::product_scope(actor) {
        ProductScope::All => {}
        ProductScope::OwnedBy(seller) => condition = condition.add(Column::SellerId.eq(seller)),
        ProductScope::Approved => condition = condition.add(Column::IsApproved.eq(true)),
    }

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Code).ilike(pattern.clone()))
                .add(Expr::col(Column::NameEn).ilike(pattern.clone()))
                .add(Expr::col(Column::NameAr).ilike(pattern)),
        );
    }
    if let Some(is_approved) = query.is_approved {
        condition = condition.add(Column::IsApproved.eq(is_approved));
    }
    if let Some(seller_id) = query.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::SellingPrice,
        ProductSortBy::Name => Column::NameEn,
        ProductSortBy::Code => Column::Code,
    };
    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_product(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("product", id))?;
    access::can_view_product(actor, &facts(&product))?;
    Ok(ApiResponse::success("Product", product_from_entity(product), None))
}

/// Admin listings are approved on creation; seller listings wait for review.
pub async fn create_product(
    state: &AppState,
    actor: &Actor,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    access::can_create_product(actor)?;
    payload.validate()?;
    ensure_price("selling_price", payload.selling_price)?;
    if let Some(purchase) = payload.purchase_price {
        ensure_price("purchase_price", purchase)?;
    }

    let auto_approve = actor.is_admin();
    let seller_id = if auto_approve {
        payload.seller_id.unwrap_or(actor.user_id)
    } else {
        actor.user_id
    };
    let now = Utc::now().fixed_offset();

    let txn = state.orm.begin().await?;
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(generate_sku()),
        name_en: Set(payload.name_en.trim().to_string()),
        name_ar: Set(payload.name_ar.trim().to_string()),
        category: Set(payload.category),
        description: Set(payload.description),
        product_variant: Set(payload.product_variant),
        selling_price: Set(payload.selling_price),
        purchase_price: Set(payload.purchase_price),
        stock_quantity: Set(payload.stock_quantity),
        image_handle: Set(payload.image_handle),
        product_link: Set(payload.product_link),
        seller_id: Set(seller_id),
        created_by: Set(Some(actor.user_id)),
        is_approved: Set(auto_approve),
        approved_by: Set(auto_approve.then_some(actor.user_id)),
        approved_at: Set(auto_approve.then_some(now)),
        warehouse_id: Set(payload.warehouse_id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::PRODUCT_CREATED, "product", product.id)
            .by(actor)
            .describe(format!("Created product {}", product.code))
            .with_metadata(json!({ "seller_id": product.seller_id, "is_approved": auto_approve })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, product_id = %product.id, code = %product.code, "product created");
    if !product.is_approved {
        let notice = Notice::product(
            NotificationKind::ProductPendingApproval,
            product.id,
            "Product pending approval",
            format!("{} ({}) is waiting for approval.", product.name_en, product.code),
        )
        .for_role(access::roles::ADMIN);
        notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// The SKU never changes. A non-admin edit of an approved product sends it
/// back to review.
pub async fn update_product(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    if let Some(price) = payload.selling_price {
        ensure_price("selling_price", price)?;
    }
    if let Some(price) = payload.purchase_price {
        ensure_price("purchase_price", price)?;
    }

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("product", id))?;
    access::can_edit_product(actor, &facts(&existing))?;

    let reverted = existing.is_approved && !actor.is_admin();
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name_en {
        active.name_en = Set(name.trim().to_string());
    }
    if let Some(name) = payload.name_ar {
        active.name_ar = Set(name.trim().to_string());
    }
    if let Some(category) = payload.category {
        active.category = Set(Some(category));
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(variant) = payload.product_variant {
        active.product_variant = Set(Some(variant));
    }
    if let Some(price) = payload.selling_price {
        active.selling_price = Set(price);
    }
    if let Some(price) = payload.purchase_price {
        active.purchase_price = Set(Some(price));
    }
    if let Some(stock) = payload.stock_quantity {
        active.stock_quantity = Set(stock);
    }
    if let Some(handle) = payload.image_handle {
        active.image_handle = Set(Some(handle));
    }
    if let Some(link) = payload.product_link {
        active.product_link = Set(Some(link));
    }
    if let Some(warehouse) = payload.warehouse_id {
        active.warehouse_id = Set(Some(warehouse));
    }
    if reverted {
        active.is_approved = Set(false);
        active.approved_by = Set(None);
        active.approved_at = Set(None);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let product = active.update(&txn).await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::PRODUCT_UPDATED, "product", product.id)
            .by(actor)
            .describe(format!("Updated product {}", product.code))
            .with_metadata(json!({ "approval_reverted": reverted })),
    )
    .await?;
    txn.commit().await?;

    if reverted {
        let notice = Notice::product(
            NotificationKind::ProductPendingApproval,
            product.id,
            "Product pending approval",
            format!("{} ({}) was edited and needs approval again.", product.name_en, product.code),
        )
        .for_role(access::roles::ADMIN);
        notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;
    }

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn approve_product(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    review_product(state, actor, id, true).await
}

pub async fn reject_product(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    review_product(state, actor, id, false).await
}

/// Both decisions stamp the reviewer in `approved_by`/`approved_at`.
async fn review_product(
    state: &AppState,
    actor: &Actor,
    id: Uuid,
    approve: bool,
) -> AppResult<ApiResponse<Product>> {
    access::can_approve_product(actor)?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("product", id))?;
    let mut active: ActiveModel = existing.into();
    let now = Utc::now().fixed_offset();
    active.is_approved = Set(approve);
    active.approved_by = Set(Some(actor.user_id));
    active.approved_at = Set(Some(now));
    active.updated_at = Set(now);
    let product = active.update(&txn).await?;

    let (action, verb) = if approve {
        (actions::PRODUCT_APPROVED, "Approved")
    } else {
        (actions::PRODUCT_REJECTED, "Rejected")
    };
    audit::append(
        &txn,
        AuditEntry::new(action, "product", product.id)
            .by(actor)
            .describe(format!("{verb} product {}", product.code)),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, product_id = %product.id, approve, "product reviewed");
    let (kind, title) = if approve {
        (NotificationKind::ProductApproved, "Product approved")
    } else {
        (NotificationKind::ProductRejected, "Product rejected")
    };
    let notice = Notice::product(
        kind,
        product.id,
        title,
        format!("{} ({}) was {}.", product.name_en, product.code, verb.to_lowercase()),
    )
    .for_role(access::roles::SELLER);
    notification_service::notify_seller(state, &notice, Some(product.seller_id)).await;

    Ok(ApiResponse::success(
        if approve { "Product approved" } else { "Product rejected" },
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn request_deletion(
    state: &AppState,
    actor: &Actor,
    product_id: Uuid,
    payload: DeletionRequestPayload,
) -> AppResult<ApiResponse<ProductDeletionRequest>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("product", product_id))?;
    access::can_request_product_deletion(actor, &facts(&product))?;

    let pending = ProductDeletionRequests::find()
        .filter(product_deletion_requests::Column::ProductId.eq(product.id))
        .filter(product_deletion_requests::Column::SellerId.eq(actor.user_id))
        .filter(product_deletion_requests::Column::Status.eq("pending"))
        .one(&txn)
        .await?;
    if pending.is_some() {
        return Err(AppError::Conflict(format!(
            "a deletion request for {} is already pending",
            product.code
        )));
    }

    let request = product_deletion_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        seller_id: Set(actor.user_id),
        reason: Set(payload.reason.trim().to_string()),
        status: Set("pending".into()),
        admin_notes: Set(None),
        requested_at: NotSet,
        reviewed_at: Set(None),
        reviewed_by: Set(None),
    }
    .insert(&txn)
    .await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::PRODUCT_DELETION_REQUESTED, "product", product.id)
            .by(actor)
            .describe(format!("Requested deletion of {}", product.code))
            .with_metadata(json!({ "request_id": request.id, "reason": request.reason })),
    )
    .await?;
    txn.commit().await?;

    let notice = Notice::product(
        NotificationKind::ProductPendingApproval,
        product.id,
        "Product deletion requested",
        format!("Deletion of {} ({}) is waiting for review.", product.name_en, product.code),
    )
    .for_role(access::roles::ADMIN);
    notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;

    Ok(ApiResponse::success(
        "Deletion requested",
        deletion_request_from_entity(request),
        Some(Meta::empty()),
    ))
}

/// Approving removes the product; the request row goes with it, so the
/// response carries the request as it stood at resolution.
pub async fn resolve_deletion(
    state: &AppState,
    actor: &Actor,
    request_id: Uuid,
    payload: ResolveDeletionRequest,
) -> AppResult<ApiResponse<ProductDeletionRequest>> {
    access::can_resolve_product_deletion(actor)?;

    let txn = state.orm.begin().await?;
    let request = ProductDeletionRequests::find_by_id(request_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("product_deletion_request", request_id))?;
    if request.status != "pending" {
        return Err(AppError::Conflict(format!(
            "deletion request is already {}",
            request.status
        )));
    }
    let product = Products::find_by_id(request.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("product", request.product_id))?;

    let mut active: product_deletion_requests::ActiveModel = request.into();
    active.status = Set(payload.decision.as_str().to_string());
    active.admin_notes = Set(payload.admin_notes);
    active.reviewed_at = Set(Some(Utc::now().fixed_offset()));
    active.reviewed_by = Set(Some(actor.user_id));
    let request = active.update(&txn).await?;

    match payload.decision {
        DeletionDecision::Approved => {
            let in_use = OrderItems::find()
                .filter(order_items::Column::ProductId.eq(product.id))
                .count(&txn)
                .await?;
            if in_use > 0 {
                return Err(AppError::Conflict(format!(
                    "product {} is on {in_use} order items and cannot be deleted",
                    product.code
                )));
            }
            Products::delete_by_id(product.id).exec(&txn).await?;
            audit::append(
                &txn,
                AuditEntry::new(actions::PRODUCT_DELETED, "product", product.id)
                    .by(actor)
                    .describe(format!("Deleted product {} on seller request", product.code))
                    .with_metadata(json!({ "request_id": request.id })),
            )
            .await?;
        }
        DeletionDecision::Rejected => {
            audit::append(
                &txn,
                AuditEntry::new(actions::PRODUCT_DELETION_REJECTED, "product", product.id)
                    .by(actor)
                    .describe(format!("Rejected deletion of {}", product.code))
                    .with_metadata(json!({ "request_id": request.id })),
            )
            .await?;
        }
    }
    txn.commit().await?;

    tracing::info!(
        actor_id = %actor.user_id,
        product_id = %product.id,
        decision = payload.decision.as_str(),
        "product deletion resolved"
    );
    let notice = match payload.decision {
        DeletionDecision::Approved => Notice::product(
            NotificationKind::ProductDeleted,
            product.id,
            "Product deleted",
            format!("{} ({}) was deleted as requested.", product.name_en, product.code),
        )
        .with_priority(NotificationPriority::High),
        DeletionDecision::Rejected => Notice::product(
            NotificationKind::ProductRejected,
            product.id,
            "Deletion request rejected",
            format!("Your request to delete {} was rejected.", product.code),
        ),
    };
    notification_service::notify_seller(state, &notice, Some(request.seller_id)).await;

    Ok(ApiResponse::success(
        "Deletion request resolved",
        deletion_request_from_entity(request),
        Some(Meta::empty()),
    ))
}

pub async fn list_deletion_requests(
    state: &AppState,
    actor: &Actor,
    query: DeletionRequestQuery,
) -> AppResult<ApiResponse<DeletionRequestList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if !actor.is_admin() {
        if !actor.is_seller() {
            return Err(AppError::denied(access::Capability::ResolveProductDeletion.as_str()));
        }
        condition = condition.add(product_deletion_requests::Column::SellerId.eq(actor.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(product_deletion_requests::Column::Status.eq(status.as_str()));
    }

    let finder = ProductDeletionRequests::find()
        .filter(condition)
        .order_by_desc(product_deletion_requests::Column::RequestedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(deletion_request_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Deletion requests",
        DeletionRequestList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        code: model.code,
        name_en: model.name_en,
        name_ar: model.name_ar,
        category: model.category,
        description: model.description,
        product_variant: model.product_variant,
        selling_price: model.selling_price,
        purchase_price: model.purchase_price,
        stock_quantity: model.stock_quantity,
        image_handle: model.image_handle,
        product_link: model.product_link,
        seller_id: model.seller_id,
        is_approved: model.is_approved,
        approved_by: model.approved_by,
        approved_at: model.approved_at.map(|t| t.with_timezone(&Utc)),
        warehouse_id: model.warehouse_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn deletion_request_from_entity(model: DeletionRequestModel) -> ProductDeletionRequest {
    ProductDeletionRequest {
        id: model.id,
        product_id: model.product_id,
        seller_id: model.seller_id,
        reason: model.reason,
        status: model.status,
        admin_notes: model.admin_notes,
        requested_at: model.requested_at.with_timezone(&Utc),
        reviewed_at: model.reviewed_at.map(|t| t.with_timezone(&Utc)),
        reviewed_by: model.reviewed_by,
    }
}

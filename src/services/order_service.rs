use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
    sea_query::{Expr, LockType, Query, extension::postgres::PgExpr},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{self, Actor, OrderFacts, OrderScope},
    audit::{self, AuditEntry, actions},
    calendar::BusinessCalendar,
    dto::orders::{CreateOrderRequest, OrderDetail, OrderItemInput, OrderList, UpdateOrderRequest},
    entity::{
        order_assignments::{self, Entity as OrderAssignments, Model as AssignmentModel},
        order_items::{self, Entity as OrderItems, Model as OrderItemModel},
        order_workflow_logs::{self, Entity as OrderWorkflowLogs, Model as WorkflowLogModel},
        orders::{self, ActiveModel as OrderActive, Column, Entity as Orders, Model as OrderModel},
        products::{self, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, WorkflowLog},
    notify::{Notice, NotificationKind},
    order_code,
    phone,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, OrderSortBy, Paged, SortOrder},
    services::{assignment_service, notification_service},
    state::AppState,
    workflow::{OrderStatus, WorkflowStatus},
};

/// `Σ quantity × price` over the items when there are any, otherwise the
/// single-product `quantity × price_per_unit`.
pub fn order_total(items: &[(i32, Decimal)], quantity: i32, price_per_unit: Decimal) -> Decimal {
    if items.is_empty() {
        Decimal::from(quantity) * price_per_unit
    } else {
        items
            .iter()
            .map(|(qty, price)| Decimal::from(*qty) * *price)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Everything needed to write one order row and its items.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub order_code: Option<String>,
    pub customer: String,
    pub customer_phone: String,
    pub street_address: String,
    pub shipping_address: String,
    pub city: String,
    pub area: String,
    pub country: String,
    pub emirate: String,
    pub region: String,
    pub zip_code: String,
    pub delivery_area: String,
    pub product_id: Option<Uuid>,
    pub product_link: String,
    pub quantity: i32,
    pub price_per_unit: Decimal,
    pub items: Vec<NewItem>,
    pub notes: String,
    pub internal_notes: String,
    pub order_date: Option<DateTime<Utc>>,
    pub seller_id: Option<Uuid>,
    pub seller_email: String,
}

/// Next free `#YYMMDDNNN` for `date`. Serialised per date by a transaction
/// scoped advisory lock, so it must run inside the inserting transaction.
pub async fn next_order_code<C: ConnectionTrait>(conn: &C, date: NaiveDate) -> AppResult<String> {
    let prefix = order_code::date_prefix(date);
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        [format!("order_code:{prefix}").into()],
    ))
    .await?;

    let taken = Orders::find()
        .filter(Column::OrderCode.starts_with(prefix.as_str()))
        .filter(Column::OrderCode.not_like(format!("{prefix}%-%")))
        .count(conn)
        .await?;
    let mut sequence = u32::try_from(taken).unwrap_or(u32::MAX - 1) + 1;
    loop {
        let candidate = order_code::format_code(date, sequence);
        if !order_code_taken(conn, &candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

pub async fn order_code_exists<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<bool> {
    Ok(Orders::find()
        .filter(Column::OrderCode.eq(code))
        .count(conn)
        .await?
        > 0)
}

/// True when `code` is used itself or as the base of `-Vn` variant codes.
pub async fn order_code_taken<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<bool> {
    Ok(Orders::find()
        .filter(
            Condition::any()
                .add(Column::OrderCode.eq(code))
                .add(Column::OrderCode.starts_with(order_code::variant_prefix(code))),
        )
        .count(conn)
        .await?
        > 0)
}

/// Insert the order and its items. A supplied code must be unused.
pub async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    calendar: &BusinessCalendar,
    new: NewOrder,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    let now = Utc::now();
    let code = match new.order_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            if order_code_exists(conn, code).await? {
                return Err(AppError::Conflict(format!("order code {code} already exists")));
            }
            code.to_string()
        }
        None => next_order_code(conn, calendar.today(now)).await?,
    };

    let lines: Vec<(i32, Decimal)> = new.items.iter().map(|i| (i.quantity, i.price)).collect();
    let total = order_total(&lines, new.quantity, new.price_per_unit);
    let order_id = Uuid::new_v4();
    let stamp = now.fixed_offset();

    let order = OrderActive {
        id: Set(order_id),
        order_code: Set(code),
        customer: Set(new.customer),
        customer_phone: Set(new.customer_phone),
        street_address: Set(new.street_address),
        shipping_address: Set(new.shipping_address),
        city: Set(new.city),
        area: Set(new.area),
        country: Set(new.country),
        emirate: Set(new.emirate),
        region: Set(new.region),
        zip_code: Set(new.zip_code),
        delivery_area: Set(new.delivery_area),
        product_id: Set(new.product_id),
        product_link: Set(new.product_link),
        quantity: Set(new.quantity),
        price_per_unit: Set(new.price_per_unit),
        total_price: Set(total),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        workflow_status: Set(WorkflowStatus::SellerSubmitted.as_str().to_string()),
        seller_id: Set(new.seller_id),
        seller_email: Set(new.seller_email),
        agent_id: Set(None),
        assigned_at: Set(None),
        escalated_to_manager: Set(false),
        escalated_by: Set(None),
        escalated_at: Set(None),
        escalation_reason: Set(String::new()),
        postponed_until: Set(None),
        call_back_time: Set(None),
        no_answer_time: Set(None),
        tracking_number: Set(String::new()),
        cancelled_reason: Set(String::new()),
        notes: Set(new.notes),
        internal_notes: Set(new.internal_notes),
        order_date: Set(new.order_date.unwrap_or(now).fixed_offset()),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(new.items.len());
    for item in new.items {
        let row = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            price: Set(item.price),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
        items.push(row);
    }
    Ok((order, items))
}

/// Rewrite the stored total from the current items and legacy fields.
pub async fn recompute_total<C: ConnectionTrait>(conn: &C, order: &OrderModel) -> AppResult<Decimal> {
    let lines: Vec<(i32, Decimal)> = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .all(conn)
        .await?
        .iter()
        .map(OrderItemModel::line)
        .collect();
    let total = order_total(&lines, order.quantity, order.price_per_unit);
    if total != order.total_price {
        Orders::update_many()
            .col_expr(Column::TotalPrice, Expr::value(total))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(order.id))
            .exec(conn)
            .await?;
    }
    Ok(total)
}

pub(crate) fn order_facts(order: &OrderModel) -> AppResult<OrderFacts> {
    Ok(OrderFacts {
        seller_id: order.seller_id,
        agent_id: order.agent_id,
        status: order.status.parse()?,
        workflow_status: order.workflow_status.parse()?,
    })
}

pub(crate) async fn lock_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))
}

async fn resolve_items<C: ConnectionTrait>(conn: &C, inputs: &[OrderItemInput]) -> AppResult<Vec<NewItem>> {
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = Products::find_by_id(input.product_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::not_found("product", input.product_id))?;
        let price = input.price.unwrap_or(product.selling_price);
        if price < Decimal::ZERO {
            return Err(AppError::validation("price", "must not be negative"));
        }
        items.push(NewItem {
            product_id: product.id,
            quantity: input.quantity,
            price,
        });
    }
    Ok(items)
}

pub async fn seller_email<C: ConnectionTrait>(conn: &C, seller_id: Option<Uuid>) -> AppResult<String> {
    let Some(seller_id) = seller_id else {
        return Ok(String::new());
    };
    Ok(Users::find_by_id(seller_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("user", seller_id))?
        .email)
}

/// Auto-assign inside a savepoint of `txn`. A failed hand-off is rolled back
/// on its own and the order stays unassigned.
pub(crate) async fn auto_assign_in_savepoint(
    txn: &DatabaseTransaction,
    calendar: &BusinessCalendar,
    order_id: Uuid,
) -> AppResult<Option<AssignmentModel>> {
    let savepoint = txn.begin().await?;
    match assignment_service::auto_assign(&savepoint, calendar, order_id, None).await {
        Ok(assignment) => {
            savepoint.commit().await?;
            Ok(assignment)
        }
        Err(err) => {
            savepoint.rollback().await?;
            tracing::warn!(%order_id, error = %err, "auto-assign failed, order left unassigned");
            Ok(None)
        }
    }
}

/// Sellers always own what they enter; staff may name a seller.
pub(crate) fn resolve_seller(actor: &Actor, requested: Option<Uuid>) -> Option<Uuid> {
    let staff = actor.is_admin() || actor.is_call_center_manager() || actor.is_call_center_agent();
    if staff {
        requested.or(actor.is_seller().then_some(actor.user_id))
    } else {
        Some(actor.user_id)
    }
}

/// Create the order and try to hand it to an agent in the same transaction.
/// The hand-off runs in a savepoint; when it fails the order stays unassigned.
pub async fn create_order(
    state: &AppState,
    actor: &Actor,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    access::can_create_order(actor)?;
    payload.validate()?;
    if payload.price_per_unit.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::validation("price_per_unit", "must not be negative"));
    }
    let seller_id = resolve_seller(actor, payload.seller_id);

    let txn = state.orm.begin().await?;
    let items = resolve_items(&txn, &payload.items).await?;
    let price_per_unit = match (payload.price_per_unit, payload.product_id) {
        (Some(price), _) => price,
        (None, Some(product_id)) => {
            Products::find_by_id(product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::not_found("product", product_id))?
                .selling_price
        }
        (None, None) => Decimal::ZERO,
    };

    let new = NewOrder {
        order_code: payload.order_code,
        customer: payload.customer.trim().to_string(),
        customer_phone: phone::normalize_or_keep(&payload.customer_phone),
        street_address: payload.street_address,
        shipping_address: payload.shipping_address,
        city: payload.city,
        area: payload.area,
        country: payload.country,
        emirate: payload.emirate,
        region: payload.region,
        zip_code: payload.zip_code,
        delivery_area: payload.delivery_area,
        product_id: payload.product_id,
        product_link: payload.product_link,
        quantity: payload.quantity.unwrap_or(1),
        price_per_unit,
        items,
        notes: payload.notes,
        internal_notes: payload.internal_notes,
        order_date: payload.order_date.map(|d| state.calendar.start_of_day(d)),
        seller_email: seller_email(&txn, seller_id).await?,
        seller_id,
    };
    let (order, items) = insert_order(&txn, &state.calendar, new).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ORDER_CREATED, "order", order.id)
            .by(actor)
            .describe(format!("Created order {}", order.order_code))
            .with_metadata(json!({ "items": items.len(), "total_price": order.total_price })),
    )
    .await?;

    let assigned = auto_assign_in_savepoint(&txn, &state.calendar, order.id).await?;
    let order = Orders::find_by_id(order.id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("order", order.id))?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, order_id = %order.id, code = %order.order_code, "order created");
    let notice = Notice::order(
        NotificationKind::OrderCreated,
        order.id,
        "New order",
        format!("Order {} for {} was created.", order.order_code, order.customer),
    );
    notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;
    notification_service::notify_seller(state, &notice, order.seller_id).await;
    if let Some(assignment) = assigned {
        let notice = Notice::order(
            NotificationKind::OrderAssigned,
            order.id,
            "New order assigned",
            format!("Order {} has been assigned to you.", order.order_code),
        )
        .for_role(access::roles::CALL_CENTER_AGENT);
        notification_service::notify_agent(state, &notice, assignment.agent_id);
    }

    Ok(ApiResponse::success(
        "Order created",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

pub(crate) async fn load_detail<C: ConnectionTrait>(conn: &C, order: OrderModel) -> AppResult<OrderDetail> {
    let items = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .order_by_asc(order_items::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();
    let history = OrderWorkflowLogs::find()
        .filter(order_workflow_logs::Column::OrderId.eq(order.id))
        .order_by_desc(order_workflow_logs::Column::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(workflow_log_from_entity)
        .collect();
    let assignment = OrderAssignments::find()
        .filter(order_assignments::Column::OrderId.eq(order.id))
        .one(conn)
        .await?
        .map(assignment_service::assignment_from_entity);
    Ok(OrderDetail {
        order: order_from_entity(order)?,
        items,
        history,
        assignment,
    })
}

pub async fn get_order(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    access::can_view_order(actor, &order_facts(&order)?)?;
    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Order", detail, None))
}

fn scope_condition(scopes: &[OrderScope]) -> Condition {
    let mut any = Condition::any();
    for scope in scopes {
        any = match scope {
            OrderScope::All => return Condition::all(),
            OrderScope::AssignedTo(agent) => any.add(Column::AgentId.eq(*agent)),
            OrderScope::OwnedBy(seller) => any.add(Column::SellerId.eq(*seller)),
            OrderScope::Stages(stages) => {
                any.add(Column::WorkflowStatus.is_in(stages.iter().map(|s| s.as_str())))
            }
        };
    }
    any
}

fn search_condition(search: &str) -> Condition {
    let pattern = format!("%{}%", search);
    let product_ids = Query::select()
        .column(products::Column::Id)
        .from(Products)
        .and_where(
            Expr::col(products::Column::NameEn)
                .ilike(pattern.clone())
                .or(Expr::col(products::Column::NameAr).ilike(pattern.clone())),
        )
        .to_owned();
    let item_orders = Query::select()
        .column(order_items::Column::OrderId)
        .from(OrderItems)
        .and_where(Expr::col(order_items::Column::ProductId).in_subquery(product_ids.clone()))
        .to_owned();
    Condition::any()
        .add(Expr::col(Column::OrderCode).ilike(pattern.clone()))
        .add(Expr::col(Column::Customer).ilike(pattern.clone()))
        .add(Expr::col(Column::CustomerPhone).ilike(pattern.clone()))
        .add(Expr::col(Column::SellerEmail).ilike(pattern.clone()))
        .add(Expr::col(Column::Notes).ilike(pattern))
        .add(Column::ProductId.in_subquery(product_ids))
        .add(Column::Id.in_subquery(item_orders))
}

/// Visibility plus every filter of the list query.
fn list_condition(state: &AppState, actor: &Actor, query: &OrderListQuery) -> AppResult<Condition> {
    let scopes = access::order_scopes(actor)?;
    let mut condition = Condition::all().add(scope_condition(&scopes));

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(search_condition(search));
    }
    if let Some(status) = query.status {
        condition = condition.add(Column::Status.eq(status.as_str()));
    }
    if let Some(workflow) = query.workflow_status {
        condition = condition.add(Column::WorkflowStatus.eq(workflow.as_str()));
    }
    if let Some(seller_id) = query.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }
    if let Some(agent_id) = query.agent_id {
        condition = condition.add(Column::AgentId.eq(agent_id));
    }
    if let Some(emirate) = query.emirate.as_deref().filter(|e| !e.is_empty()) {
        condition = condition.add(Expr::col(Column::Emirate).ilike(emirate.to_string()));
    }
    if let Some(bucket) = query.date {
        let range = state.calendar.bucket_range(bucket, Utc::now());
        condition = condition.add(Column::CreatedAt.gte(range.start.fixed_offset()));
        if let Some(end) = range.end {
            condition = condition.add(Column::CreatedAt.lt(end.fixed_offset()));
        }
    }
    if let Some(min) = query.min_amount {
        condition = condition.add(Column::TotalPrice.gte(min));
    }
    if let Some(max) = query.max_amount {
        condition = condition.add(Column::TotalPrice.lte(max));
    }
    Ok(condition)
}

fn sorted(
    finder: sea_orm::Select<Orders>,
    sort_by: Option<OrderSortBy>,
    sort_order: Option<SortOrder>,
) -> sea_orm::Select<Orders> {
    let column = match sort_by.unwrap_or(OrderSortBy::CreatedAt) {
        OrderSortBy::CreatedAt => Column::CreatedAt,
        OrderSortBy::OrderDate => Column::OrderDate,
        OrderSortBy::TotalPrice => Column::TotalPrice,
        OrderSortBy::OrderCode => Column::OrderCode,
        OrderSortBy::Customer => Column::Customer,
        OrderSortBy::Status => Column::Status,
    };
    match sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(column).order_by_asc(Column::Id),
        SortOrder::Desc => finder.order_by_desc(column).order_by_desc(Column::Id),
    }
}

pub async fn list_orders(
    state: &AppState,
    actor: &Actor,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let condition = list_condition(state, actor, &query)?;
    let finder = sorted(Orders::find().filter(condition), query.sort_by, query.sort_order);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Non-status fields only; status moves go through the workflow service.
pub async fn update_order(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;
    if payload.price_per_unit.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::validation("price_per_unit", "must not be negative"));
    }

    let txn = state.orm.begin().await?;
    let existing = lock_order(&txn, order_id).await?;
    access::can_edit_order(actor, &order_facts(&existing)?)?;

    let mut changed: Vec<&str> = Vec::new();
    let mut active: OrderActive = existing.into();
    macro_rules! apply {
        ($field:ident, $value:expr) => {
            if let Some(value) = $value {
                active.$field = Set(value);
                changed.push(stringify!($field));
            }
        };
    }
    apply!(customer, payload.customer.map(|c| c.trim().to_string()));
    apply!(customer_phone, payload.customer_phone.map(|p| phone::normalize_or_keep(&p)));
    apply!(street_address, payload.street_address);
    apply!(shipping_address, payload.shipping_address);
    apply!(city, payload.city);
    apply!(area, payload.area);
    apply!(country, payload.country);
    apply!(emirate, payload.emirate);
    apply!(region, payload.region);
    apply!(zip_code, payload.zip_code);
    apply!(delivery_area, payload.delivery_area);
    apply!(product_link, payload.product_link);
    apply!(quantity, payload.quantity);
    apply!(price_per_unit, payload.price_per_unit);
    apply!(notes, payload.notes);
    apply!(internal_notes, payload.internal_notes);
    apply!(
        order_date,
        payload.order_date.map(|d| state.calendar.start_of_day(d).fixed_offset())
    );
    active.updated_at = Set(Utc::now().fixed_offset());
    let order = active.update(&txn).await?;
    let total = recompute_total(&txn, &order).await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::ORDER_UPDATED, "order", order.id)
            .by(actor)
            .describe(format!("Updated order {}", order.order_code))
            .with_metadata(json!({ "fields": changed, "total_price": total })),
    )
    .await?;
    let order = OrderModel {
        total_price: total,
        ..order
    };
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

/// Super Admin always; the owning seller only while the order is pending.
pub async fn delete_order(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    access::can_delete_order(actor, &order_facts(&order)?)?;

    Orders::delete_by_id(order.id).exec(&txn).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ORDER_DELETED, "order", order.id)
            .by(actor)
            .describe(format!("Deleted order {}", order.order_code))
            .with_metadata(json!({ "status": order.status, "seller_id": order.seller_id })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, order_id = %order.id, "order deleted");
    Ok(ApiResponse::success(
        "Order deleted",
        json!({ "id": order.id, "order_code": order.order_code }),
        Some(Meta::empty()),
    ))
}

pub async fn append_item(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    payload: OrderItemInput,
) -> AppResult<ApiResponse<OrderDetail>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    access::can_edit_order(actor, &order_facts(&order)?)?;

    let item = resolve_items(&txn, std::slice::from_ref(&payload))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::validation("items", "is required"))?;
    let row = order_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(item.product_id),
        quantity: Set(item.quantity),
        price: Set(item.price),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    let total = recompute_total(&txn, &order).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ORDER_ITEM_ADDED, "order", order.id)
            .by(actor)
            .describe(format!("Added item to {}", order.order_code))
            .with_metadata(json!({
                "item_id": row.id,
                "product_id": row.product_id,
                "quantity": row.quantity,
                "total_price": total,
            })),
    )
    .await?;
    let order = lock_order(&txn, order.id).await?;
    let detail = load_detail(&txn, order).await?;
    txn.commit().await?;

    Ok(ApiResponse::success("Item added", detail, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    item_id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    access::can_edit_order(actor, &order_facts(&order)?)?;

    let item = OrderItems::find_by_id(item_id)
        .filter(order_items::Column::OrderId.eq(order.id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("order_item", item_id))?;
    OrderItems::delete_by_id(item.id).exec(&txn).await?;
    let total = recompute_total(&txn, &order).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ORDER_ITEM_REMOVED, "order", order.id)
            .by(actor)
            .describe(format!("Removed item from {}", order.order_code))
            .with_metadata(json!({ "item_id": item.id, "total_price": total })),
    )
    .await?;
    let order = lock_order(&txn, order.id).await?;
    let detail = load_detail(&txn, order).await?;
    txn.commit().await?;

    Ok(ApiResponse::success("Item removed", detail, Some(Meta::empty())))
}

pub const EXPORT_HEADERS: [&str; 12] = [
    "Order Code",
    "Customer",
    "Customer Phone",
    "Product",
    "Quantity",
    "Total Price (AED)",
    "Status",
    "Date",
    "Seller Email",
    "Notes",
    "Shipping Address",
    "Price Per Unit (AED)",
];

/// CSV of every order matching the list filters. Multi-item orders export
/// their first item in the product, quantity and unit price columns.
pub async fn export_orders(state: &AppState, actor: &Actor, query: OrderListQuery) -> AppResult<String> {
    access::can_export(actor)?;
    let condition = list_condition(state, actor, &query)?;
    let orders = sorted(Orders::find().filter(condition), query.sort_by, query.sort_order)
        .all(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut first_items: HashMap<Uuid, OrderItemModel> = HashMap::new();
    for item in OrderItems::find()
        .filter(order_items::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_items::Column::CreatedAt)
        .all(&state.orm)
        .await?
    {
        first_items.entry(item.order_id).or_insert(item);
    }
    let product_ids: Vec<Uuid> = orders
        .iter()
        .filter_map(|o| first_items.get(&o.id).map(|i| i.product_id).or(o.product_id))
        .collect();
    let product_names: HashMap<Uuid, String> = Products::find()
        .filter(products::Column::Id.is_in(product_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name_en))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;
    for order in &orders {
        let (product_id, quantity, unit_price) = match first_items.get(&order.id) {
            Some(item) => (Some(item.product_id), item.quantity, item.price),
            None => (order.product_id, order.quantity, order.price_per_unit),
        };
        let product = product_id
            .and_then(|id| product_names.get(&id).cloned())
            .unwrap_or_default();
        let address = if order.shipping_address.is_empty() {
            order.street_address.clone()
        } else {
            order.shipping_address.clone()
        };
        let date = state
            .calendar
            .today(order.order_date.with_timezone(&Utc))
            .format("%Y-%m-%d")
            .to_string();
        writer.write_record([
            order.order_code.as_str(),
            order.customer.as_str(),
            order.customer_phone.as_str(),
            product.as_str(),
            quantity.to_string().as_str(),
            order.total_price.to_string().as_str(),
            order.status.as_str(),
            date.as_str(),
            order.seller_email.as_str(),
            order.notes.as_str(),
            address.as_str(),
            unit_price.to_string().as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("csv buffer: {e}")))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.into()))?;

    let txn = state.orm.begin().await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::EXPORT, "order", "*")
            .by(actor)
            .describe(format!("Exported {} orders", orders.len()))
            .with_metadata(json!({ "count": orders.len() })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, count = orders.len(), "orders exported");
    Ok(body)
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        status: model.status.parse()?,
        workflow_status: model.workflow_status.parse()?,
        id: model.id,
        order_code: model.order_code,
        customer: model.customer,
        customer_phone: model.customer_phone,
        street_address: model.street_address,
        shipping_address: model.shipping_address,
        city: model.city,
        area: model.area,
        country: model.country,
        emirate: model.emirate,
        region: model.region,
        zip_code: model.zip_code,
        delivery_area: model.delivery_area,
        product_id: model.product_id,
        product_link: model.product_link,
        quantity: model.quantity,
        price_per_unit: model.price_per_unit,
        total_price: model.total_price,
        seller_id: model.seller_id,
        seller_email: model.seller_email,
        agent_id: model.agent_id,
        assigned_at: model.assigned_at.map(|t| t.with_timezone(&Utc)),
        escalated_to_manager: model.escalated_to_manager,
        escalated_by: model.escalated_by,
        escalated_at: model.escalated_at.map(|t| t.with_timezone(&Utc)),
        escalation_reason: model.escalation_reason,
        postponed_until: model.postponed_until.map(|t| t.with_timezone(&Utc)),
        call_back_time: model.call_back_time.map(|t| t.with_timezone(&Utc)),
        no_answer_time: model.no_answer_time.map(|t| t.with_timezone(&Utc)),
        tracking_number: model.tracking_number,
        cancelled_reason: model.cancelled_reason,
        notes: model.notes,
        internal_notes: model.internal_notes,
        order_date: model.order_date.with_timezone(&Utc),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn workflow_log_from_entity(model: WorkflowLogModel) -> WorkflowLog {
    WorkflowLog {
        id: model.id,
        order_id: model.order_id,
        from_status: model.from_status,
        to_status: model.to_status,
        from_workflow_status: model.from_workflow_status,
        to_workflow_status: model.to_workflow_status,
        actor_id: model.actor_id,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

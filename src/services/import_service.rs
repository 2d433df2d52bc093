use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{self, Actor, roles},
    audit::{self, AuditEntry, actions},
    entity::products::{Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    import::{
        ImportReport,
        decode::{decode_upload, read_table},
        mapping::{ParsedRow, map_headers, parse_row},
    },
    notify::{Notice, NotificationKind, NotificationPriority},
    order_code,
    phone,
    response::{ApiResponse, Meta},
    services::{
        notification_service,
        order_service::{self, NewOrder},
    },
    state::AppState,
};

/// Look up a free-text product reference, trying in order: exact code, partial
/// code, exact English name, partial English name, partial Arabic name, id.
pub async fn find_product<C: ConnectionTrait>(conn: &C, reference: &str) -> AppResult<Option<ProductModel>> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Ok(None);
    }
    let partial = format!("%{reference}%");

    let matchers = [
        Expr::col(Column::Code).eq(reference),
        Expr::col(Column::Code).ilike(partial.clone()),
        Expr::col(Column::NameEn).ilike(reference.to_string()),
        Expr::col(Column::NameEn).ilike(partial.clone()),
        Expr::col(Column::NameAr).ilike(partial),
    ];
    for matcher in matchers {
        let found = Products::find()
            .filter(matcher)
            .order_by_asc(Column::CreatedAt)
            .one(conn)
            .await?;
        if found.is_some() {
            return Ok(found);
        }
    }
    match Uuid::parse_str(reference) {
        Ok(id) => Ok(Products::find_by_id(id).one(conn).await?),
        Err(_) => Ok(None),
    }
}

/// Sellers import for themselves; staff import for the selected seller or,
/// without one, for themselves.
fn import_seller(actor: &Actor, selected: Option<Uuid>) -> Uuid {
    if actor.is_seller() && !actor.is_admin() {
        actor.user_id
    } else {
        selected.unwrap_or(actor.user_id)
    }
}

fn supplied_code(row: &ParsedRow) -> Option<String> {
    row.order_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Codes this row will occupy: the supplied one, or its `-Vn` variants when
/// the row fans out. `None` entries are generated on insert.
fn planned_codes(row: &ParsedRow) -> Vec<Option<String>> {
    let base = supplied_code(row);
    if !row.fans_out() {
        return vec![base];
    }
    (1..=row.variants.len())
        .map(|i| base.as_deref().map(|b| order_code::variant_code(b, i)))
        .collect()
}

/// Import orders from an uploaded CSV. Each row commits on its own; a row
/// that fails is reported and the rest carry on.
pub async fn import_orders(
    state: &AppState,
    actor: &Actor,
    upload: &[u8],
    selected_seller: Option<Uuid>,
) -> AppResult<ApiResponse<ImportReport>> {
    access::can_import(actor)?;
    let text = decode_upload(upload, state.config.import_max_bytes)?;
    let table = read_table(text.as_bytes())?;
    let header_map = map_headers(&table.headers)?;

    let seller_id = import_seller(actor, selected_seller);
    let seller_email = order_service::seller_email(&state.orm, Some(seller_id)).await?;

    let mut report = ImportReport::default();
    let mut assigned: Vec<(Uuid, String, Uuid)> = Vec::new();
    for (line, reason) in &table.malformed {
        report.reject(*line, reason.clone());
    }
    for (line, cells) in &table.rows {
        let outcome = parse_row(cells, &header_map);
        for warning in &outcome.warnings {
            report.warn(*line, warning);
        }
        let Some(row) = outcome.row else {
            report.reject(*line, outcome.errors.join("; "));
            continue;
        };

        match import_row(state, actor, &row, seller_id, &seller_email, *line).await {
            Ok(imported) => {
                if let Some(warning) = &imported.warning {
                    report.warn(*line, warning);
                }
                for (order_id, code, agent) in imported.created {
                    report.success_count += 1;
                    report.created_order_codes.push(code.clone());
                    if let Some(agent_id) = agent {
                        assigned.push((order_id, code, agent_id));
                    }
                }
            }
            Err(err) => {
                tracing::debug!(row = *line, error = %err, "import row rejected");
                report.reject(*line, row_error(&err));
            }
        }
    }

    let txn = state.orm.begin().await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ORDERS_IMPORTED, "order", "*")
            .by(actor)
            .describe(format!(
                "Imported {} orders ({} rows failed)",
                report.success_count, report.error_count
            ))
            .with_metadata(json!({
                "success_count": report.success_count,
                "error_count": report.error_count,
                "seller_id": seller_id,
            })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(
        actor_id = %actor.user_id,
        success = report.success_count,
        failed = report.error_count,
        "orders imported"
    );
    if report.success_count > 0 {
        let notice = Notice {
            title: "Orders imported".to_string(),
            message: format!(
                "{} orders were imported by {}.",
                report.success_count, actor.email
            ),
            kind: NotificationKind::OrdersImported,
            priority: NotificationPriority::Medium,
            target_role: None,
            related_entity_type: "order",
            related_entity_id: String::new(),
            related_url: "/orders".to_string(),
        };
        notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;
    }
    for (order_id, code, agent_id) in assigned {
        let notice = Notice::order(
            NotificationKind::OrderAssigned,
            order_id,
            "New order assigned",
            format!("Order {code} has been assigned to you."),
        )
        .for_role(roles::CALL_CENTER_AGENT);
        notification_service::notify_agent(state, &notice, agent_id);
    }

    Ok(ApiResponse::success("Import finished", report, Some(Meta::empty())))
}

/// Human reason for a failed row. Storage failures stay generic.
fn row_error(err: &AppError) -> String {
    match err {
        AppError::Validation { .. } | AppError::Conflict(_) | AppError::NotFound { .. } => err.to_string(),
        _ => "could not be saved".to_string(),
    }
}

struct ImportedRow {
    created: Vec<(Uuid, String, Option<Uuid>)>,
    warning: Option<String>,
}

/// Write every order of one row in one transaction.
async fn import_row(
    state: &AppState,
    actor: &Actor,
    row: &ParsedRow,
    seller_id: Uuid,
    seller_email: &str,
    line: usize,
) -> AppResult<ImportedRow> {
    let txn = state.orm.begin().await?;

    // A supplied base is checked even when only its variants get written.
    if let Some(base) = supplied_code(row) {
        if order_service::order_code_taken(&txn, &base).await? {
            return Err(AppError::Conflict(format!("order code {base} already exists")));
        }
    }
    let codes = planned_codes(row);
    for code in codes.iter().flatten() {
        if order_service::order_code_exists(&txn, code).await? {
            return Err(AppError::Conflict(format!("order code {code} already exists")));
        }
    }

    let mut warning = None;
    let product = match row.product_ref.as_deref() {
        Some(reference) => {
            let found = find_product(&txn, reference).await?;
            if found.is_none() {
                warning = Some(format!("product '{reference}' not found, order created without product"));
            }
            found
        }
        None => None,
    };
    let price = row
        .price
        .or(product.as_ref().map(|p| p.selling_price))
        .unwrap_or(Decimal::ZERO);
    if price < Decimal::ZERO {
        return Err(AppError::validation("price", "must not be negative"));
    }

    // Generated codes for a fanned-out row share one base.
    let codes = if row.fans_out() && codes.iter().all(Option::is_none) {
        let base = order_service::next_order_code(&txn, state.calendar.today(Utc::now())).await?;
        (1..=row.variants.len())
            .map(|i| Some(order_code::variant_code(&base, i)))
            .collect()
    } else {
        codes
    };

    let mut created = Vec::with_capacity(codes.len());
    for (index, code) in codes.into_iter().enumerate() {
        let variant = row.fans_out().then(|| row.variants[index].as_str());
        let new = NewOrder {
            order_code: code,
            customer: row.customer.clone(),
            customer_phone: phone::normalize_or_keep(&row.phone),
            street_address: row.address.clone(),
            shipping_address: row.address.clone(),
            city: row.city.clone(),
            area: row.area.clone(),
            emirate: row.emirate.clone(),
            product_id: product.as_ref().map(|p| p.id),
            product_link: row.product_link.clone(),
            quantity: row.quantity,
            price_per_unit: price,
            notes: row.notes_for(variant),
            order_date: row.order_date.map(|d| state.calendar.start_of_day(d)),
            seller_id: Some(seller_id),
            seller_email: seller_email.to_string(),
            ..NewOrder::default()
        };
        let (order, _) = order_service::insert_order(&txn, &state.calendar, new).await?;
        audit::append(
            &txn,
            AuditEntry::new(actions::ORDER_CREATED, "order", order.id)
                .by(actor)
                .describe(format!("Imported order {} from row {line}", order.order_code))
                .with_metadata(json!({ "row": line, "product_id": order.product_id })),
        )
        .await?;
        let assignment =
            order_service::auto_assign_in_savepoint(&txn, &state.calendar, order.id).await?;
        created.push((order.id, order.order_code, assignment.map(|a| a.agent_id)));
    }
    txn.commit().await?;
    Ok(ImportedRow { created, warning })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: Option<&str>, variants: &[&str]) -> ParsedRow {
        ParsedRow {
            order_code: code.map(str::to_string),
            customer: "J".into(),
            phone: "+971501234567".into(),
            address: "X".into(),
            product_ref: Some("SKU-1".into()),
            quantity: 2,
            price: Some(Decimal::from(10)),
            variants: variants.iter().map(|v| v.to_string()).collect(),
            notes: String::new(),
            product_link: String::new(),
            order_date: None,
            city: String::new(),
            emirate: String::new(),
            area: String::new(),
        }
    }

    #[test]
    fn supplied_code_fans_out_into_variant_codes() {
        let codes = planned_codes(&row(Some("#250122001"), &["Red", "Blue"]));
        assert_eq!(
            codes,
            vec![Some("#250122001-V1".to_string()), Some("#250122001-V2".to_string())]
        );
    }

    #[test]
    fn single_variant_keeps_the_supplied_code() {
        let codes = planned_codes(&row(Some("#250122001"), &["Red"]));
        assert_eq!(codes, vec![Some("#250122001".to_string())]);
    }

    #[test]
    fn blank_supplied_code_counts_as_missing() {
        assert_eq!(supplied_code(&row(Some("  "), &["Red", "Blue"])), None);
        assert_eq!(
            supplied_code(&row(Some(" #250122001 "), &["Red", "Blue"])).as_deref(),
            Some("#250122001")
        );
    }

    #[test]
    fn missing_code_is_generated_later() {
        assert_eq!(planned_codes(&row(None, &[])), vec![None]);
        assert_eq!(planned_codes(&row(None, &["A", "B", "C"])).len(), 3);
    }

    #[test]
    fn sellers_always_import_for_themselves() {
        let seller = Actor::new(Uuid::new_v4(), &[roles::SELLER]);
        let other = Uuid::new_v4();
        assert_eq!(import_seller(&seller, Some(other)), seller.user_id);

        let admin = Actor::new(Uuid::new_v4(), &[roles::ADMIN]);
        assert_eq!(import_seller(&admin, Some(other)), other);
        assert_eq!(import_seller(&admin, None), admin.user_id);
    }
}

use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde_json::json;

use crate::{
    access::{self, Actor},
    audit::{self, AuditEntry, actions},
    dto::audit::AuditLogList,
    entity::audit_logs::{Column, Entity as AuditLogs, Model as AuditLogModel},
    error::{AppError, AppResult},
    models::AuditLog,
    response::{ApiResponse, Meta},
    routes::params::{AuditLogQuery, Paged},
    state::AppState,
};

fn filter_condition(query: &AuditLogQuery) -> Condition {
    let mut condition = Condition::all();
    if let Some(actor_id) = query.actor_id {
        condition = condition.add(Column::ActorId.eq(actor_id));
    }
    if let Some(action) = query.action.as_deref().filter(|a| !a.is_empty()) {
        condition = condition.add(Column::Action.eq(action));
    }
    if let Some(entity_type) = query.entity_type.as_deref().filter(|e| !e.is_empty()) {
        condition = condition.add(Column::EntityType.eq(entity_type));
    }
    if let Some(entity_id) = query.entity_id.as_deref().filter(|e| !e.is_empty()) {
        condition = condition.add(Column::EntityId.eq(entity_id));
    }
    if let Some(from) = query.from {
        condition = condition.add(Column::CreatedAt.gte(from.fixed_offset()));
    }
    if let Some(to) = query.to {
        condition = condition.add(Column::CreatedAt.lt(to.fixed_offset()));
    }
    condition
}

pub async fn list_audit_logs(
    state: &AppState,
    actor: &Actor,
    query: AuditLogQuery,
) -> AppResult<ApiResponse<AuditLogList>> {
    access::can_view_audit_log(actor)?;
    let (page, limit, offset) = query.pagination().normalize();

    let finder = AuditLogs::find()
        .filter(filter_condition(&query))
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(audit_log_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Audit logs",
        AuditLogList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// CSV of the filtered log, oldest first. The export is audited itself.
pub async fn export_audit_logs(
    state: &AppState,
    actor: &Actor,
    query: AuditLogQuery,
) -> AppResult<String> {
    access::can_export(actor)?;
    let rows = AuditLogs::find()
        .filter(filter_condition(&query))
        .order_by_asc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(&state.orm)
        .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Timestamp",
        "Actor",
        "Action",
        "Entity Type",
        "Entity Id",
        "Description",
        "IP Address",
        "User Agent",
    ])?;
    for row in &rows {
        writer.write_record([
            row.created_at.with_timezone(&Utc).to_rfc3339().as_str(),
            row.actor_id.map(|id| id.to_string()).unwrap_or_default().as_str(),
            row.action.as_str(),
            row.entity_type.as_str(),
            row.entity_id.as_str(),
            row.description.as_str(),
            row.ip_address.as_deref().unwrap_or_default(),
            row.user_agent.as_deref().unwrap_or_default(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("csv buffer: {e}")))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.into()))?;

    let txn = state.orm.begin().await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::EXPORT, "audit_log", "*")
            .by(actor)
            .describe(format!("Exported {} audit log rows", rows.len()))
            .with_metadata(json!({ "count": rows.len() })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, count = rows.len(), "audit log exported");
    Ok(body)
}

pub(crate) fn audit_log_from_entity(model: AuditLogModel) -> AuditLog {
    AuditLog {
        id: model.id,
        actor_id: model.actor_id,
        action: model.action,
        entity_type: model.entity_type,
        entity_id: model.entity_id,
        description: model.description,
        ip_address: model.ip_address,
        user_agent: model.user_agent,
        metadata: model.metadata,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

use chrono::Utc;
use sea_orm::{EntityTrait, Set, TransactionTrait, sea_query::OnConflict};
use serde_json::json;

use crate::{
    access::{self, Actor},
    audit::{self, AuditEntry, actions},
    dto::agents::SetAgentStatusRequest,
    entity::agent_sessions::{self, Entity as AgentSessions},
    error::{AppError, AppResult},
    models::AgentSession,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// An agent sets their own availability. `offline` takes them out of the
/// dispatch pool until they come back.
pub async fn set_status(
    state: &AppState,
    actor: &Actor,
    payload: SetAgentStatusRequest,
) -> AppResult<ApiResponse<AgentSession>> {
    access::can_set_agent_status(actor)?;

    let now = Utc::now().fixed_offset();
    let txn = state.orm.begin().await?;
    let previous = AgentSessions::find_by_id(actor.user_id)
        .one(&txn)
        .await?
        .map(|s| s.status);

    AgentSessions::insert(agent_sessions::ActiveModel {
        agent_id: Set(actor.user_id),
        status: Set(payload.status.as_str().to_string()),
        updated_at: Set(now),
    })
    .on_conflict(
        OnConflict::column(agent_sessions::Column::AgentId)
            .update_columns([
                agent_sessions::Column::Status,
                agent_sessions::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec(&txn)
    .await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::AGENT_STATUS, "agent", actor.user_id)
            .by(actor)
            .describe(format!("Agent status set to {}", payload.status.as_str()))
            .with_metadata(json!({ "from": previous, "to": payload.status })),
    )
    .await?;
    let session = AgentSessions::find_by_id(actor.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("agent_session", actor.user_id))?;
    txn.commit().await?;

    tracing::info!(agent_id = %actor.user_id, status = %session.status, "agent status changed");
    Ok(ApiResponse::success(
        "Agent status updated",
        AgentSession {
            agent_id: session.agent_id,
            status: session.status,
            updated_at: session.updated_at.with_timezone(&Utc),
        },
        Some(Meta::empty()),
    ))
}

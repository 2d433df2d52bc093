use uuid::Uuid;

use crate::{
    access::roles,
    error::AppResult,
    notify::{Audience, Notice},
    state::AppState,
};

/// Active users holding Admin or Super Admin through an effective binding.
pub async fn admin_user_ids(state: &AppState) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT r.user_id
        FROM user_active_roles r
        JOIN users u ON u.id = r.user_id
        WHERE u.is_active AND r.role_name = ANY($1)
        ORDER BY r.user_id
        "#,
    )
    .bind(vec![roles::SUPER_ADMIN.to_string(), roles::ADMIN.to_string()])
    .fetch_all(&state.pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn is_admin_user(state: &AppState, user_id: Uuid) -> AppResult<bool> {
    let row: Option<(bool,)> = sqlx::query_as(
        r#"
        SELECT u.is_superuser OR EXISTS (
            SELECT 1 FROM user_active_roles r
            WHERE r.user_id = u.id AND r.role_name = ANY($2)
        )
        FROM users u WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .bind(vec![roles::SUPER_ADMIN.to_string(), roles::ADMIN.to_string()])
    .fetch_optional(&state.pool)
    .await?;
    Ok(row.is_some_and(|(admin,)| admin))
}

/// Recipient lookups run after commit; a failing lookup is logged and the
/// notice dropped.
pub async fn notify_admins(state: &AppState, notice: &Notice, actor: Option<Uuid>) {
    match admin_user_ids(state).await {
        Ok(user_ids) => state
            .notifier
            .notify(notice, &Audience::Admins { user_ids, actor }),
        Err(err) => tracing::warn!(error = %err, kind = ?notice.kind, "admin recipients lookup failed"),
    }
}

pub async fn notify_seller(state: &AppState, notice: &Notice, seller_id: Option<Uuid>) {
    let Some(user_id) = seller_id else {
        return;
    };
    match is_admin_user(state, user_id).await {
        Ok(is_admin) => state
            .notifier
            .notify(notice, &Audience::Seller { user_id, is_admin }),
        Err(err) => tracing::warn!(error = %err, %user_id, "seller lookup failed"),
    }
}

pub fn notify_agent(state: &AppState, notice: &Notice, agent_id: Uuid) {
    state.notifier.notify(notice, &Audience::Agent(agent_id));
}

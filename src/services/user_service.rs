use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
    sea_query::LockType, sea_query::extension::postgres::PgExpr,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{self, Actor},
    audit::{self, AuditEntry, actions},
    dto::users::{CreateUserRequest, SetActiveRequest, SetApprovalRequest, UserList},
    entity::users::{self, Column, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    models::User,
    notify::{Audience, Notice, NotificationKind, NotificationPriority},
    phone,
    response::{ApiResponse, Meta},
    routes::params::{Paged, UserQuery},
    services::role_service,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    actor: &Actor,
    query: UserQuery,
) -> AppResult<ApiResponse<UserList>> {
    access::can_manage_users(actor)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Email).ilike(pattern.clone()))
                .add(Expr::col(Column::FullName).ilike(pattern)),
        );
    }
    if let Some(status) = query.approval_status.as_ref() {
        condition = condition.add(Column::ApprovalStatus.eq(status.as_str()));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// New accounts start pending approval.
pub async fn create_user(
    state: &AppState,
    actor: &Actor,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    access::can_manage_users(actor)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email.trim().to_lowercase()),
        full_name: Set(payload.full_name.trim().to_string()),
        phone: Set(phone::normalize_or_keep(&payload.phone)),
        is_active: Set(true),
        is_superuser: Set(false),
        approval_status: Set("pending".into()),
        email_verified: Set(false),
        force_password_change: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::USER_CREATED, "user", user.id)
            .by(actor)
            .describe(format!("Created user {}", user.email)),
    )
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn set_approval(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
    payload: SetApprovalRequest,
) -> AppResult<ApiResponse<User>> {
    access::can_manage_users(actor)?;
    let decision = payload.decision.as_str();

    let txn = state.orm.begin().await?;
    let existing = lock_user(&txn, user_id).await?;
    let mut active: users::ActiveModel = existing.into();
    active.approval_status = Set(decision.to_string());
    active.updated_at = Set(Utc::now().fixed_offset());
    let user = active.update(&txn).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::USER_UPDATED, "user", user.id)
            .by(actor)
            .describe(format!("Account {decision}"))
            .with_metadata(json!({ "approval_status": decision })),
    )
    .await?;
    txn.commit().await?;

    let notice = Notice {
        title: format!("Account {decision}"),
        message: format!("Your account has been {decision}."),
        kind: NotificationKind::AccountApproval,
        priority: NotificationPriority::High,
        target_role: None,
        related_entity_type: "user",
        related_entity_id: user.id.to_string(),
        related_url: "/profile".to_string(),
    };
    state.notifier.notify(&notice, &Audience::User(user.id));

    Ok(ApiResponse::success(
        "Approval updated",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn set_active(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
    payload: SetActiveRequest,
) -> AppResult<ApiResponse<User>> {
    access::can_manage_users(actor)?;
    if user_id == actor.user_id && !payload.is_active {
        return Err(AppError::validation("is_active", "cannot deactivate yourself"));
    }

    let txn = state.orm.begin().await?;
    let existing = lock_user(&txn, user_id).await?;
    let mut active: users::ActiveModel = existing.into();
    active.is_active = Set(payload.is_active);
    active.updated_at = Set(Utc::now().fixed_offset());
    let user = active.update(&txn).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::USER_UPDATED, "user", user.id)
            .by(actor)
            .describe(if payload.is_active { "Account activated" } else { "Account deactivated" })
            .with_metadata(json!({ "is_active": payload.is_active })),
    )
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "User updated",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

/// Super Admin only; role bindings go with the user. The last member of a
/// role that must keep one cannot be deleted.
pub async fn delete_user(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    access::can_delete_user(actor)?;
    if user_id == actor.user_id {
        return Err(AppError::validation("id", "cannot delete yourself"));
    }

    let txn = state.orm.begin().await?;
    let user = lock_user(&txn, user_id).await?;
    for (_, role) in role_service::active_bindings(&txn, user.id).await? {
        role_service::ensure_other_member(&txn, user.id, &role).await?;
    }
    Users::delete_by_id(user.id).exec(&txn).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::USER_DELETED, "user", user.id)
            .by(actor)
            .describe(format!("Deleted user {}", user.email)),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, user_id = %user.id, "user deleted");
    Ok(ApiResponse::success(
        "User deleted",
        json!({ "id": user_id }),
        Some(Meta::empty()),
    ))
}

async fn lock_user<C: sea_orm::ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        full_name: model.full_name,
        phone: model.phone,
        is_active: model.is_active,
        is_superuser: model.is_superuser,
        approval_status: model.approval_status,
        email_verified: model.email_verified,
        force_password_change: model.force_password_change,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

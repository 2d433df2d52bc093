use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{self, Actor, roles as role_names},
    audit::{self, AuditEntry, actions},
    dto::roles::{
        AssignRoleRequest, CreatePermissionRequest, CreateRoleRequest, PermissionList,
        RoleList, RolePermissionsResult, SetRolePermissionsRequest, UpdateRoleRequest,
        UserRoleList,
    },
    entity::{
        permissions::{self, Entity as Permissions, Model as PermissionModel},
        role_permissions::{self, Entity as RolePermissions},
        roles::{self, Entity as Roles, Model as RoleModel},
        user_roles::{self, Entity as UserRoles, Model as UserRoleModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{Permission, Role, RoleSummary, UserRoleBinding},
    response::{ApiResponse, Meta},
    state::AppState,
};

const PERMISSION_TYPES: [&str; 10] = [
    "create", "read", "update", "delete", "export", "import", "approve", "reject", "assign",
    "manage",
];

/// Bind `role` to `user`, creating or reactivating the binding. With
/// `primary`, any other primary binding of the user is demoted first so the
/// one-primary index never sees two.
pub async fn bind_role<C: ConnectionTrait>(
    conn: &C,
    assigned_by: Option<Uuid>,
    user_id: Uuid,
    role_id: Uuid,
    primary: bool,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> AppResult<(UserRoleModel, RoleModel)> {
    let role = Roles::find_by_id(role_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("role", role_id))?;
    if !role.is_active {
        return Err(AppError::RoleNotActive(role.name));
    }
    Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;

    let existing = UserRoles::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .filter(user_roles::Column::RoleId.eq(role_id))
        .lock(LockType::Update)
        .one(conn)
        .await?;

    if primary {
        UserRoles::update_many()
            .col_expr(user_roles::Column::IsPrimary, Expr::value(false))
            .filter(user_roles::Column::UserId.eq(user_id))
            .filter(user_roles::Column::RoleId.ne(role_id))
            .filter(user_roles::Column::IsPrimary.eq(true))
            .exec(conn)
            .await?;
    }

    let expires_at = expires_at.map(|at| at.fixed_offset());
    let binding = match existing {
        Some(existing) => {
            let keep_primary = existing.is_primary;
            let mut active: user_roles::ActiveModel = existing.into();
            active.is_active = Set(true);
            active.is_primary = Set(primary || keep_primary);
            active.expires_at = Set(expires_at);
            active.assigned_by = Set(assigned_by);
            active.update(conn).await?
        }
        None => {
            user_roles::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                role_id: Set(role_id),
                is_primary: Set(primary),
                is_active: Set(true),
                expires_at: Set(expires_at),
                assigned_by: Set(assigned_by),
                assigned_at: NotSet,
            }
            .insert(conn)
            .await?
        }
    };
    Ok((binding, role))
}

/// Remove the binding. A role that must keep a member refuses to lose its last one.
pub async fn unbind_role<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    role_id: Uuid,
) -> AppResult<RoleModel> {
    let role = Roles::find_by_id(role_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("role", role_id))?;
    let binding = UserRoles::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .filter(user_roles::Column::RoleId.eq(role_id))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("user_role", format!("{user_id}/{role_id}")))?;

    ensure_other_member(conn, user_id, &role).await?;

    UserRoles::delete_by_id(binding.id).exec(conn).await?;
    Ok(role)
}

/// Fails with `LastProtectedAssignment` when `role` must keep a member and no
/// user other than `user_id` holds an effective binding to it.
pub async fn ensure_other_member<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    role: &RoleModel,
) -> AppResult<()> {
    if !role_names::must_keep_member(&role.name) {
        return Ok(());
    }
    let now = Utc::now().fixed_offset();
    let remaining = UserRoles::find()
        .filter(user_roles::Column::RoleId.eq(role.id))
        .filter(user_roles::Column::UserId.ne(user_id))
        .filter(user_roles::Column::IsActive.eq(true))
        .filter(
            Condition::any()
                .add(user_roles::Column::ExpiresAt.is_null())
                .add(user_roles::Column::ExpiresAt.gt(now)),
        )
        .lock(LockType::Update)
        .all(conn)
        .await?
        .len();
    if remaining == 0 {
        return Err(AppError::LastProtectedAssignment(role.name.clone()));
    }
    Ok(())
}

/// Effective (active, unexpired, role active) bindings of a user, oldest first.
pub async fn active_bindings<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<(UserRoleModel, RoleModel)>> {
    let now = Utc::now().fixed_offset();
    let rows = UserRoles::find()
        .find_also_related(Roles)
        .filter(user_roles::Column::UserId.eq(user_id))
        .order_by_asc(user_roles::Column::AssignedAt)
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(binding, role)| role.map(|role| (binding, role)))
        .filter(|(binding, role)| binding.is_effective(now) && role.is_active)
        .collect())
}

pub async fn has_role<C: ConnectionTrait>(conn: &C, user_id: Uuid, role_name: &str) -> AppResult<bool> {
    Ok(active_bindings(conn, user_id)
        .await?
        .iter()
        .any(|(_, role)| role.name == role_name))
}

/// The primary binding's role, or the oldest active binding when none is primary.
pub async fn primary_role<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Option<RoleModel>> {
    let bindings = active_bindings(conn, user_id).await?;
    let primary = bindings
        .iter()
        .position(|(binding, _)| binding.is_primary)
        .unwrap_or(0);
    Ok(bindings.into_iter().nth(primary).map(|(_, role)| role))
}

pub async fn has_permission<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    code: &str,
    module: Option<&str>,
) -> AppResult<bool> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;
    if user.is_superuser {
        return Ok(true);
    }
    let bindings = active_bindings(conn, user_id).await?;
    if bindings.iter().any(|(_, role)| role.name == role_names::SUPER_ADMIN) {
        return Ok(true);
    }
    let role_ids: Vec<Uuid> = bindings.iter().map(|(_, role)| role.id).collect();
    if role_ids.is_empty() {
        return Ok(false);
    }

    let mut finder = RolePermissions::find()
        .find_also_related(Permissions)
        .filter(role_permissions::Column::RoleId.is_in(role_ids))
        .filter(role_permissions::Column::Granted.eq(true))
        .filter(permissions::Column::Code.eq(code))
        .filter(permissions::Column::IsActive.eq(true));
    if let Some(module) = module {
        finder = finder.filter(permissions::Column::Module.eq(module));
    }
    Ok(finder.one(conn).await?.is_some())
}

pub async fn find_role_by_name<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<RoleModel> {
    Roles::find()
        .filter(roles::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("role", name))
}

pub async fn assign_role(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
    payload: AssignRoleRequest,
) -> AppResult<ApiResponse<UserRoleBinding>> {
    access::can_manage_roles(actor)?;
    let txn = state.orm.begin().await?;

    let (binding, role) = bind_role(
        &txn,
        Some(actor.user_id),
        user_id,
        payload.role_id,
        payload.is_primary,
        payload.expires_at,
    )
    .await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::USER_ROLE_ASSIGNED, "user", user_id)
            .by(actor)
            .describe(format!("Assigned role '{}'", role.name))
            .with_metadata(json!({ "role_id": role.id, "is_primary": binding.is_primary })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, %user_id, role = %role.name, "role assigned");
    Ok(ApiResponse::success(
        "Role assigned",
        binding_from_entity(binding, &role),
        Some(Meta::empty()),
    ))
}

pub async fn revoke_role(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
    role_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    access::can_manage_roles(actor)?;
    let txn = state.orm.begin().await?;
    let role = unbind_role(&txn, user_id, role_id).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::USER_ROLE_REMOVED, "user", user_id)
            .by(actor)
            .describe(format!("Removed role '{}'", role.name))
            .with_metadata(json!({ "role_id": role.id })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, %user_id, role = %role.name, "role revoked");
    Ok(ApiResponse::success(
        "Role removed",
        json!({ "user_id": user_id, "role_id": role_id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_user_roles(
    state: &AppState,
    actor: &Actor,
    user_id: Uuid,
) -> AppResult<ApiResponse<UserRoleList>> {
    if actor.user_id != user_id {
        access::can_manage_users(actor)?;
    }
    let rows = UserRoles::find()
        .find_also_related(Roles)
        .filter(user_roles::Column::UserId.eq(user_id))
        .order_by_desc(user_roles::Column::IsPrimary)
        .order_by_asc(user_roles::Column::AssignedAt)
        .all(&state.orm)
        .await?;
    let items = rows
        .into_iter()
        .filter_map(|(binding, role)| role.map(|role| binding_from_entity(binding, &role)))
        .collect();
    Ok(ApiResponse::success(
        "User roles",
        UserRoleList { items },
        Some(Meta::empty()),
    ))
}

pub async fn list_roles(state: &AppState, actor: &Actor) -> AppResult<ApiResponse<RoleList>> {
    access::can_manage_users(actor)?;
    let roles = Roles::find()
        .order_by_asc(roles::Column::Name)
        .all(&state.orm)
        .await?;

    let now = Utc::now().fixed_offset();
    let mut members: HashMap<Uuid, i64> = HashMap::new();
    for binding in UserRoles::find()
        .filter(user_roles::Column::IsActive.eq(true))
        .all(&state.orm)
        .await?
    {
        if binding.is_effective(now) {
            *members.entry(binding.role_id).or_default() += 1;
        }
    }
    let mut grants: HashMap<Uuid, i64> = HashMap::new();
    for grant in RolePermissions::find()
        .filter(role_permissions::Column::Granted.eq(true))
        .all(&state.orm)
        .await?
    {
        *grants.entry(grant.role_id).or_default() += 1;
    }

    let items = roles
        .into_iter()
        .map(|role| RoleSummary {
            member_count: members.get(&role.id).copied().unwrap_or(0),
            permission_count: grants.get(&role.id).copied().unwrap_or(0),
            role: role_from_entity(role),
        })
        .collect();
    Ok(ApiResponse::success("Roles", RoleList { items }, Some(Meta::empty())))
}

pub async fn create_role(
    state: &AppState,
    actor: &Actor,
    payload: CreateRoleRequest,
) -> AppResult<ApiResponse<Role>> {
    access::can_manage_roles(actor)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let role = roles::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        role_type: Set(payload.role_type),
        description: Set(payload.description),
        is_active: Set(true),
        is_default: Set(false),
        is_protected: Set(false),
        created_by: Set(Some(actor.user_id)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ROLE_CREATED, "role", role.id)
            .by(actor)
            .describe(format!("Created role '{}'", role.name)),
    )
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Role created",
        role_from_entity(role),
        Some(Meta::empty()),
    ))
}

pub async fn update_role(
    state: &AppState,
    actor: &Actor,
    role_id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<Role>> {
    access::can_manage_roles(actor)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Roles::find_by_id(role_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("role", role_id))?;

    if existing.is_protected {
        let renaming = payload.name.as_ref().is_some_and(|n| n.trim() != existing.name);
        let deactivating = payload.is_active == Some(false);
        if renaming || deactivating {
            return Err(AppError::ProtectedRole(existing.name));
        }
    }

    let mut active: roles::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let role = active.update(&txn).await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::ROLE_UPDATED, "role", role.id)
            .by(actor)
            .describe(format!("Updated role '{}'", role.name)),
    )
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Role updated",
        role_from_entity(role),
        Some(Meta::empty()),
    ))
}

/// Protected and default roles are structural and cannot be removed.
pub async fn delete_role(
    state: &AppState,
    actor: &Actor,
    role_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    access::can_manage_roles(actor)?;
    let txn = state.orm.begin().await?;
    let role = Roles::find_by_id(role_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("role", role_id))?;
    if role.is_protected || role.is_default {
        return Err(AppError::ProtectedRole(role.name));
    }

    Roles::delete_by_id(role.id).exec(&txn).await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::ROLE_DELETED, "role", role.id)
            .by(actor)
            .describe(format!("Deleted role '{}'", role.name)),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, role = %role.name, "role deleted");
    Ok(ApiResponse::success(
        "Role deleted",
        json!({ "id": role_id }),
        Some(Meta::empty()),
    ))
}

/// Replace the granted permission set of a role. One audit row per change.
pub async fn set_role_permissions(
    state: &AppState,
    actor: &Actor,
    role_id: Uuid,
    payload: SetRolePermissionsRequest,
) -> AppResult<ApiResponse<RolePermissionsResult>> {
    access::can_manage_roles(actor)?;
    let txn = state.orm.begin().await?;
    let role = Roles::find_by_id(role_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("role", role_id))?;

    let wanted: HashSet<Uuid> = payload.permission_ids.into_iter().collect();
    let known: HashMap<Uuid, PermissionModel> = Permissions::find()
        .filter(permissions::Column::Id.is_in(wanted.iter().copied().collect::<Vec<_>>()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    if let Some(missing) = wanted.iter().find(|id| !known.contains_key(id)) {
        return Err(AppError::not_found("permission", missing));
    }

    let current = RolePermissions::find()
        .filter(role_permissions::Column::RoleId.eq(role.id))
        .all(&txn)
        .await?;
    let currently_granted: HashSet<Uuid> = current
        .iter()
        .filter(|rp| rp.granted)
        .map(|rp| rp.permission_id)
        .collect();

    let mut revoked = Vec::new();
    for rp in current.iter().filter(|rp| !wanted.contains(&rp.permission_id)) {
        RolePermissions::delete_by_id(rp.id).exec(&txn).await?;
        if rp.granted {
            revoked.push(rp.permission_id);
        }
    }

    let mut granted = Vec::new();
    for permission_id in wanted.iter().filter(|id| !currently_granted.contains(id)) {
        match current.iter().find(|rp| rp.permission_id == *permission_id) {
            Some(rp) => {
                let mut active: role_permissions::ActiveModel = rp.clone().into();
                active.granted = Set(true);
                active.granted_by = Set(Some(actor.user_id));
                active.granted_at = Set(Utc::now().fixed_offset());
                active.update(&txn).await?;
            }
            None => {
                role_permissions::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    role_id: Set(role.id),
                    permission_id: Set(*permission_id),
                    granted: Set(true),
                    granted_by: Set(Some(actor.user_id)),
                    granted_at: NotSet,
                }
                .insert(&txn)
                .await?;
            }
        }
        granted.push(*permission_id);
    }
    granted.sort();
    revoked.sort();

    for permission_id in &granted {
        let code = known.get(permission_id).map(|p| p.code.as_str()).unwrap_or("");
        audit::append(
            &txn,
            AuditEntry::new(actions::PERMISSION_GRANTED, "role", role.id)
                .by(actor)
                .describe(format!("Granted '{code}' to role '{}'", role.name))
                .with_metadata(json!({ "permission_id": permission_id, "code": code })),
        )
        .await?;
    }
    for permission_id in &revoked {
        audit::append(
            &txn,
            AuditEntry::new(actions::PERMISSION_REVOKED, "role", role.id)
                .by(actor)
                .describe(format!("Revoked permission from role '{}'", role.name))
                .with_metadata(json!({ "permission_id": permission_id })),
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(
        actor_id = %actor.user_id,
        role = %role.name,
        granted = granted.len(),
        revoked = revoked.len(),
        "role permissions replaced"
    );
    Ok(ApiResponse::success(
        "Role permissions updated",
        RolePermissionsResult {
            role_id: role.id,
            granted,
            revoked,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_permissions(
    state: &AppState,
    actor: &Actor,
) -> AppResult<ApiResponse<PermissionList>> {
    access::can_manage_users(actor)?;
    let items = Permissions::find()
        .order_by_asc(permissions::Column::Module)
        .order_by_asc(permissions::Column::Code)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(permission_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Permissions",
        PermissionList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_permission(
    state: &AppState,
    actor: &Actor,
    payload: CreatePermissionRequest,
) -> AppResult<ApiResponse<Permission>> {
    access::can_manage_roles(actor)?;
    payload.validate()?;
    if !PERMISSION_TYPES.contains(&payload.permission_type.as_str()) {
        return Err(AppError::validation(
            "permission_type",
            format!("must be one of {}", PERMISSION_TYPES.join(", ")),
        ));
    }

    let txn = state.orm.begin().await?;
    let permission = permissions::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(payload.code.trim().to_string()),
        name: Set(payload.name),
        permission_type: Set(payload.permission_type),
        module: Set(payload.module),
        description: Set(payload.description),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    audit::append(
        &txn,
        AuditEntry::new(actions::PERMISSION_CREATED, "permission", permission.id)
            .by(actor)
            .describe(format!("Created permission '{}'", permission.code)),
    )
    .await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Permission created",
        permission_from_entity(permission),
        Some(Meta::empty()),
    ))
}

pub(crate) fn role_from_entity(model: RoleModel) -> Role {
    Role {
        id: model.id,
        name: model.name,
        role_type: model.role_type,
        description: model.description,
        is_active: model.is_active,
        is_default: model.is_default,
        is_protected: model.is_protected,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn permission_from_entity(model: PermissionModel) -> Permission {
    Permission {
        id: model.id,
        code: model.code,
        name: model.name,
        permission_type: model.permission_type,
        module: model.module,
        description: model.description,
        is_active: model.is_active,
    }
}

pub(crate) fn binding_from_entity(model: UserRoleModel, role: &RoleModel) -> UserRoleBinding {
    UserRoleBinding {
        id: model.id,
        user_id: model.user_id,
        role_id: model.role_id,
        role_name: role.name.clone(),
        is_primary: model.is_primary,
        is_active: model.is_active,
        expires_at: model.expires_at.map(|t| t.with_timezone(&Utc)),
        assigned_by: model.assigned_by,
        assigned_at: model.assigned_at.with_timezone(&Utc),
    }
}

mod common;

use common::{assign_directly, count, create_user, insert_order, setup_state, status_change};
use fulfillment_engine::{
    access::roles,
    dto::roles::AssignRoleRequest,
    error::AppError,
    services::{role_service, user_service, workflow_service},
    workflow::OrderStatus,
};

// Integration flow: a primary role assigned twice stays one binding, the last
// Super Admin can be neither revoked nor deleted, and deleting users keeps
// their workflow history and their orders.
#[tokio::test]
async fn role_bindings_and_user_deletion() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };

    let state = setup_state(&database_url).await?;

    let owner = create_user(&state.pool, "owner@example.com", roles::SUPER_ADMIN).await?;
    let mut root = create_user(&state.pool, "root@example.com", roles::ADMIN).await?;
    sqlx::query("UPDATE users SET is_superuser = TRUE WHERE id = $1")
        .bind(root.user_id)
        .execute(&state.pool)
        .await?;
    root.is_superuser = true;

    let super_admin = role_service::find_role_by_name(&state.orm, roles::SUPER_ADMIN).await?;
    let agent_role = role_service::find_role_by_name(&state.orm, roles::CALL_CENTER_AGENT).await?;

    // Primary twice: one binding, one primary, the old primary demoted.
    let staff = create_user(&state.pool, "staff@example.com", roles::SELLER).await?;
    for _ in 0..2 {
        let binding = role_service::assign_role(
            &state,
            &owner,
            staff.user_id,
            AssignRoleRequest {
                role_id: agent_role.id,
                is_primary: true,
                expires_at: None,
            },
        )
        .await?
        .data
        .expect("binding");
        assert!(binding.is_primary);
    }
    assert_eq!(
        count(&state.pool, "SELECT COUNT(*) FROM user_roles WHERE user_id = $1", staff.user_id).await?,
        2
    );
    assert_eq!(
        count(
            &state.pool,
            "SELECT COUNT(*) FROM user_roles WHERE user_id = $1 AND is_primary",
            staff.user_id
        )
        .await?,
        1
    );
    let primary = role_service::primary_role(&state.orm, staff.user_id)
        .await?
        .expect("primary role");
    assert_eq!(primary.id, agent_role.id);

    // Only Super Admins manage roles.
    let err = role_service::revoke_role(&state, &staff, owner.user_id, super_admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied { .. }));

    // The owner is the only Super Admin member.
    let err = role_service::revoke_role(&state, &root, owner.user_id, super_admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LastProtectedAssignment(ref role) if role == roles::SUPER_ADMIN));
    let err = user_service::delete_user(&state, &root, owner.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LastProtectedAssignment(ref role) if role == roles::SUPER_ADMIN));
    assert_eq!(
        count(&state.pool, "SELECT COUNT(*) FROM users WHERE id = $1", owner.user_id).await?,
        1
    );

    // An agent with workflow history and a seller with an order can both go.
    let seller = create_user(&state.pool, "seller@example.com", roles::SELLER).await?;
    let agent = create_user(&state.pool, "agent@example.com", roles::CALL_CENTER_AGENT).await?;
    let order_id = insert_order(&state.pool, "#KEEP-01", Some(seller.user_id)).await?;
    assign_directly(&state.pool, order_id, agent.user_id).await?;
    workflow_service::transition_status(
        &state,
        &agent,
        order_id,
        status_change(OrderStatus::Confirmed, None),
    )
    .await?;

    user_service::delete_user(&state, &owner, agent.user_id).await?;
    assert_eq!(
        count(
            &state.pool,
            "SELECT COUNT(*) FROM order_workflow_logs WHERE actor_id = $1",
            agent.user_id
        )
        .await?,
        1
    );

    user_service::delete_user(&state, &owner, seller.user_id).await?;
    let (seller_id, agent_id): (Option<uuid::Uuid>, Option<uuid::Uuid>) =
        sqlx::query_as("SELECT seller_id, agent_id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!((seller_id, agent_id), (None, None));

    // With a second member the owner's binding can be removed.
    role_service::assign_role(
        &state,
        &owner,
        root.user_id,
        AssignRoleRequest {
            role_id: super_admin.id,
            is_primary: false,
            expires_at: None,
        },
    )
    .await?;
    role_service::revoke_role(&state, &root, owner.user_id, super_admin.id).await?;
    assert!(!role_service::has_role(&state.orm, owner.user_id, roles::SUPER_ADMIN).await?);

    Ok(())
}

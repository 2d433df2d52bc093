mod common;

use common::{assign_directly, audit_rows, count, create_user, insert_order, setup_state, status_change};
use fulfillment_engine::{
    access::{Actor, roles},
    audit::actions,
    dto::orders::{StatusChangeRequest, WorkflowAdvanceRequest},
    error::AppError,
    services::workflow_service,
    state::AppState,
    workflow::{OrderStatus, WorkflowStatus},
};
use uuid::Uuid;

const HISTORY: &str = "SELECT COUNT(*) FROM order_workflow_logs WHERE order_id = $1";

// Integration flow: re-emitting the current status writes nothing, the
// escalation reason and tracking number are required through the service,
// and a shipped order cancels the same way on both axes while a delivered
// one does not.
#[tokio::test]
async fn transitions_enforce_inputs_and_cancellation() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };

    let state = setup_state(&database_url).await?;

    let owner = create_user(&state.pool, "owner@example.com", roles::SUPER_ADMIN).await?;
    let seller = create_user(&state.pool, "seller@example.com", roles::SELLER).await?;
    let agent = create_user(&state.pool, "agent@example.com", roles::CALL_CENTER_AGENT).await?;

    let first = insert_order(&state.pool, "#FLOW-01", Some(seller.user_id)).await?;
    assign_directly(&state.pool, first, agent.user_id).await?;

    // Same status again: unchanged, no history, no audit.
    let same = workflow_service::transition_status(
        &state,
        &agent,
        first,
        status_change(OrderStatus::Pending, None),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(same.status, OrderStatus::Pending);
    assert_eq!(same.workflow_status, WorkflowStatus::SellerSubmitted);
    assert_eq!(audit_rows(&state.pool, actions::STATUS_CHANGE, first).await?, 0);
    assert_eq!(count(&state.pool, HISTORY, first).await?, 0);

    // Escalation needs a reason.
    let err = workflow_service::transition_status(
        &state,
        &agent,
        first,
        status_change(OrderStatus::EscalateManager, None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "escalation_reason"));
    assert_eq!(count(&state.pool, HISTORY, first).await?, 0);

    let escalated = workflow_service::transition_status(
        &state,
        &agent,
        first,
        StatusChangeRequest {
            escalation_reason: Some("Customer disputes the price".into()),
            ..status_change(OrderStatus::EscalateManager, None)
        },
    )
    .await?
    .data
    .expect("order");
    assert!(escalated.escalated_to_manager);
    assert_eq!(escalated.escalated_by, Some(agent.user_id));
    assert_eq!(escalated.escalation_reason, "Customer disputes the price");
    assert_eq!(escalated.workflow_status, WorkflowStatus::CallcenterReview);
    assert_eq!(audit_rows(&state.pool, actions::STATUS_CHANGE, first).await?, 1);

    // Shipping needs a tracking number.
    step(&state, &agent, first, OrderStatus::Confirmed).await?;
    step(&state, &owner, first, OrderStatus::Packaged).await?;
    let err = workflow_service::transition_status(
        &state,
        &owner,
        first,
        status_change(OrderStatus::Shipped, None),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "tracking_number"));

    let shipped = ship(&state, &owner, first).await?;
    assert_eq!(shipped.tracking_number, "TRK-0001");
    assert_eq!(shipped.workflow_status, WorkflowStatus::DeliveryInProgress);

    // Cancelling in delivery: status path.
    let cancelled = workflow_service::transition_status(
        &state,
        &owner,
        first,
        status_change(OrderStatus::Cancelled, Some("Refused at the door")),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.workflow_status, WorkflowStatus::Cancelled);

    // Cancelling in delivery: workflow path.
    let second = insert_order(&state.pool, "#FLOW-02", Some(seller.user_id)).await?;
    step(&state, &owner, second, OrderStatus::Confirmed).await?;
    step(&state, &owner, second, OrderStatus::Packaged).await?;
    ship(&state, &owner, second).await?;
    let err = workflow_service::advance_workflow(&state, &owner, second, cancel_workflow(None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cancelled_reason"));
    let cancelled = workflow_service::advance_workflow(
        &state,
        &owner,
        second,
        cancel_workflow(Some("Refused at the door")),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.workflow_status, WorkflowStatus::Cancelled);
    assert_eq!(cancelled.cancelled_reason, "Refused at the door");

    // Delivered orders cancel on neither axis.
    let third = insert_order(&state.pool, "#FLOW-03", Some(seller.user_id)).await?;
    step(&state, &owner, third, OrderStatus::Confirmed).await?;
    step(&state, &owner, third, OrderStatus::Packaged).await?;
    ship(&state, &owner, third).await?;
    step(&state, &owner, third, OrderStatus::Delivered).await?;
    let history = count(&state.pool, HISTORY, third).await?;

    let err = workflow_service::transition_status(
        &state,
        &owner,
        third,
        status_change(OrderStatus::Cancelled, Some("Too late")),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    let err = workflow_service::advance_workflow(&state, &owner, third, cancel_workflow(Some("Too late")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert_eq!(count(&state.pool, HISTORY, third).await?, history);

    Ok(())
}

async fn step(state: &AppState, actor: &Actor, order_id: Uuid, status: OrderStatus) -> anyhow::Result<()> {
    let order = workflow_service::transition_status(state, actor, order_id, status_change(status, None))
        .await?
        .data
        .expect("order");
    assert_eq!(order.status, status);
    Ok(())
}

async fn ship(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
) -> anyhow::Result<fulfillment_engine::models::Order> {
    let order = workflow_service::transition_status(
        state,
        actor,
        order_id,
        StatusChangeRequest {
            tracking_number: Some("TRK-0001".into()),
            ..status_change(OrderStatus::Shipped, None)
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(order.status, OrderStatus::Shipped);
    Ok(order)
}

fn cancel_workflow(reason: Option<&str>) -> WorkflowAdvanceRequest {
    WorkflowAdvanceRequest {
        workflow_status: WorkflowStatus::Cancelled,
        cancelled_reason: reason.map(str::to_string),
        tracking_number: None,
        notes: None,
    }
}

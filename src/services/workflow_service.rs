use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{self, Actor, roles},
    audit::{self, AuditEntry, actions},
    dto::orders::{StatusChangeRequest, WorkflowAdvanceRequest},
    entity::{
        order_workflow_logs,
        orders::{ActiveModel as OrderActive, Model as OrderModel},
    },
    error::AppResult,
    models::Order,
    notify::{Notice, NotificationKind, NotificationPriority},
    response::{ApiResponse, Meta},
    services::{
        notification_service,
        order_service::{lock_order, order_facts, order_from_entity},
    },
    state::AppState,
    workflow::{self, OrderState, OrderStatus, TransitionInput, TransitionPlan, TransitionTarget},
};

pub async fn transition_status(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    payload: StatusChangeRequest,
) -> AppResult<ApiResponse<Order>> {
    let input = payload.input();
    apply_transition(state, actor, order_id, TransitionTarget::Status(payload.status), input).await
}

pub async fn advance_workflow(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    payload: WorkflowAdvanceRequest,
) -> AppResult<ApiResponse<Order>> {
    let input = payload.input();
    apply_transition(
        state,
        actor,
        order_id,
        TransitionTarget::Workflow(payload.workflow_status),
        input,
    )
    .await
}

/// Lock, gate, plan, then write the order, its workflow log row and the
/// audit row in one transaction. Re-emitting the current state is a no-op.
async fn apply_transition(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    target: TransitionTarget,
    input: TransitionInput,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    let facts = order_facts(&order)?;
    access::can_transition(actor, &facts, target)?;

    let current = OrderState {
        status: facts.status,
        workflow_status: facts.workflow_status,
        tracking_number: order.tracking_number.clone(),
    };
    let Some(plan) = workflow::plan_transition(&current, target, &input)? else {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Order unchanged",
            order_from_entity(order)?,
            Some(Meta::empty()),
        ));
    };

    let now = Utc::now().fixed_offset();
    let code = order.order_code.clone();
    let mut active: OrderActive = order.into();
    active.status = Set(plan.to_status.as_str().to_string());
    active.workflow_status = Set(plan.to_workflow.as_str().to_string());
    if let Some(reason) = &plan.cancelled_reason {
        active.cancelled_reason = Set(reason.clone());
    }
    if let Some(tracking) = &plan.tracking_number {
        active.tracking_number = Set(tracking.clone());
    }
    if let Some(reason) = &plan.escalation_reason {
        active.escalated_to_manager = Set(true);
        active.escalated_by = Set(Some(actor.user_id));
        active.escalated_at = Set(Some(now));
        active.escalation_reason = Set(reason.clone());
    }
    if let Some(at) = plan.postponed_until {
        active.postponed_until = Set(Some(at.fixed_offset()));
    }
    if let Some(at) = plan.call_back_time {
        active.call_back_time = Set(Some(at.fixed_offset()));
    }
    if let Some(at) = plan.no_answer_time {
        active.no_answer_time = Set(Some(at.fixed_offset()));
    }
    active.updated_at = Set(now);
    let order = active.update(&txn).await?;

    order_workflow_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        from_status: Set(plan.from_status.as_str().to_string()),
        to_status: Set(plan.to_status.as_str().to_string()),
        from_workflow_status: Set(plan.from_workflow.as_str().to_string()),
        to_workflow_status: Set(plan.to_workflow.as_str().to_string()),
        actor_id: Set(Some(actor.user_id)),
        notes: Set(plan.notes.clone()),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    audit::append(
        &txn,
        AuditEntry::new(actions::STATUS_CHANGE, "order", order.id)
            .by(actor)
            .describe(describe(&code, &plan))
            .with_metadata(json!({
                "from_status": plan.from_status,
                "to_status": plan.to_status,
                "from_workflow_status": plan.from_workflow,
                "to_workflow_status": plan.to_workflow,
                "cancelled_reason": plan.cancelled_reason,
                "escalation_reason": plan.escalation_reason,
            })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(
        actor_id = %actor.user_id,
        order_id = %order.id,
        from = %plan.from_status,
        to = %plan.to_status,
        workflow = %plan.to_workflow,
        "order transitioned"
    );
    notify_transition(state, actor, &order, &plan).await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

fn describe(code: &str, plan: &TransitionPlan) -> String {
    if plan.status_changed() {
        format!("Order {code}: {} -> {}", plan.from_status, plan.to_status)
    } else {
        format!("Order {code}: {} -> {}", plan.from_workflow, plan.to_workflow)
    }
}

async fn notify_transition(
    state: &AppState,
    actor: &Actor,
    order: &OrderModel,
    plan: &TransitionPlan,
) {
    let notice = Notice::order(
        NotificationKind::OrderStatusChanged,
        order.id,
        "Order status changed",
        format!(
            "Order {} is now {} ({}).",
            order.order_code, plan.to_status, plan.to_workflow
        ),
    );
    notification_service::notify_seller(state, &notice, order.seller_id).await;

    if plan.to_status == OrderStatus::EscalateManager {
        let notice = Notice::order(
            NotificationKind::OrderEscalated,
            order.id,
            "Order escalated",
            format!(
                "Order {} was escalated: {}",
                order.order_code,
                plan.escalation_reason.as_deref().unwrap_or_default()
            ),
        )
        .with_priority(NotificationPriority::High)
        .for_role(roles::CALL_CENTER_MANAGER);
        notification_service::notify_admins(state, &notice, Some(actor.user_id)).await;
    }
}

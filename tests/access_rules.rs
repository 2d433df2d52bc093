use fulfillment_engine::{
    access::{
        self, Actor, OrderFacts, OrderScope, ProductFacts, ProductScope, roles,
    },
    error::AppError,
    workflow::{OrderStatus, TransitionTarget, WorkflowStatus},
};
use uuid::Uuid;

fn actor(role: &str) -> Actor {
    Actor::new(Uuid::new_v4(), &[role])
}

fn order(seller: Option<Uuid>, agent: Option<Uuid>, status: OrderStatus, workflow: WorkflowStatus) -> OrderFacts {
    OrderFacts {
        seller_id: seller,
        agent_id: agent,
        status,
        workflow_status: workflow,
    }
}

fn denied_capability(result: Result<(), AppError>) -> String {
    match result {
        Err(AppError::PermissionDenied { capability }) => capability,
        other => panic!("expected permission denied, got {other:?}"),
    }
}

#[test]
fn export_is_reserved_to_super_admin() {
    assert_eq!(denied_capability(access::can_export(&actor(roles::ADMIN))), "export_data");

    let mut superuser = actor(roles::SELLER);
    superuser.is_superuser = true;
    assert!(access::can_export(&superuser).is_ok());
    assert!(access::can_export(&actor(roles::SUPER_ADMIN)).is_ok());
}

#[test]
fn agents_only_see_their_assignments() {
    let agent = actor(roles::CALL_CENTER_AGENT);
    let mine = order(None, Some(agent.user_id), OrderStatus::Pending, WorkflowStatus::SellerSubmitted);
    let theirs = order(None, Some(Uuid::new_v4()), OrderStatus::Pending, WorkflowStatus::SellerSubmitted);

    assert!(access::can_view_order(&agent, &mine).is_ok());
    assert_eq!(denied_capability(access::can_view_order(&agent, &theirs)), "view_order");
    assert_eq!(
        access::order_scopes(&agent).unwrap(),
        vec![OrderScope::AssignedTo(agent.user_id)]
    );
}

#[test]
fn roles_without_order_visibility_cannot_list() {
    assert_eq!(
        denied_capability(access::order_scopes(&actor(roles::ACCOUNTANT)).map(|_| ())),
        "list_orders"
    );
}

#[test]
fn stage_roles_see_their_pipeline_slice() {
    let keeper = actor(roles::STOCK_KEEPER);
    let in_pick = order(None, None, OrderStatus::Confirmed, WorkflowStatus::PickAndPack);
    let in_delivery = order(None, None, OrderStatus::Shipped, WorkflowStatus::DeliveryInProgress);

    assert!(access::can_view_order(&keeper, &in_pick).is_ok());
    assert!(access::can_view_order(&keeper, &in_delivery).is_err());
    assert!(access::can_view_order(&actor(roles::DELIVERY_AGENT), &in_delivery).is_ok());
}

#[test]
fn sellers_cannot_cancel_their_orders() {
    let seller = actor(roles::SELLER);
    let facts = order(Some(seller.user_id), None, OrderStatus::Pending, WorkflowStatus::SellerSubmitted);

    let result = access::can_transition(&seller, &facts, TransitionTarget::Status(OrderStatus::Cancelled));
    assert_eq!(denied_capability(result), "cancel_order");
}

#[test]
fn call_center_may_cancel_and_confirm() {
    let manager = actor(roles::CALL_CENTER_MANAGER);
    let facts = order(None, None, OrderStatus::Processing, WorkflowStatus::CallcenterReview);

    for target in [
        TransitionTarget::Status(OrderStatus::Cancelled),
        TransitionTarget::Status(OrderStatus::Confirmed),
        TransitionTarget::Workflow(WorkflowStatus::CallcenterApproved),
    ] {
        assert!(access::can_transition(&manager, &facts, target).is_ok(), "{target}");
    }
    assert_eq!(
        denied_capability(access::can_transition(
            &manager,
            &facts,
            TransitionTarget::Status(OrderStatus::Shipped)
        )),
        "change_status"
    );
}

#[test]
fn packaging_agents_drive_packaging_only() {
    let packer = actor(roles::PACKAGING_AGENT);
    let facts = order(None, None, OrderStatus::Confirmed, WorkflowStatus::PackagingInProgress);

    assert!(
        access::can_transition(&packer, &facts, TransitionTarget::Workflow(WorkflowStatus::PackagingCompleted))
            .is_ok()
    );
    assert_eq!(
        denied_capability(access::can_transition(
            &packer,
            &facts,
            TransitionTarget::Workflow(WorkflowStatus::DeliveryInProgress)
        )),
        "advance_workflow"
    );
}

#[test]
fn confirmed_orders_are_frozen_except_for_super_admin() {
    let confirmed = order(None, None, OrderStatus::Confirmed, WorkflowStatus::CallcenterApproved);

    assert_eq!(
        denied_capability(access::can_edit_order(&actor(roles::ADMIN), &confirmed)),
        "edit_confirmed_order"
    );
    assert!(access::can_edit_order(&actor(roles::SUPER_ADMIN), &confirmed).is_ok());
}

#[test]
fn sellers_delete_only_their_pending_orders() {
    let seller = actor(roles::SELLER);
    let pending = order(Some(seller.user_id), None, OrderStatus::Pending, WorkflowStatus::SellerSubmitted);
    let processing = order(Some(seller.user_id), None, OrderStatus::Processing, WorkflowStatus::CallcenterReview);
    let foreign = order(Some(Uuid::new_v4()), None, OrderStatus::Pending, WorkflowStatus::SellerSubmitted);

    assert!(access::can_delete_order(&seller, &pending).is_ok());
    assert!(access::can_delete_order(&seller, &processing).is_err());
    assert!(access::can_delete_order(&seller, &foreign).is_err());
    assert!(access::can_delete_order(&actor(roles::ADMIN), &pending).is_err());
}

#[test]
fn audit_log_needs_admin_or_the_read_permission() {
    let mut accountant = actor(roles::ACCOUNTANT);
    assert!(access::can_view_audit_log(&accountant).is_err());

    accountant
        .permissions
        .insert(("audit_logs.read".to_string(), "audit_logs".to_string()));
    assert!(access::can_view_audit_log(&accountant).is_ok());
    assert!(access::can_view_audit_log(&actor(roles::ADMIN)).is_ok());
}

#[test]
fn catalog_visibility_depends_on_role() {
    let seller = actor(roles::SELLER);
    assert_eq!(access::product_scope(&seller), ProductScope::OwnedBy(seller.user_id));
    assert_eq!(access::product_scope(&actor(roles::ADMIN)), ProductScope::All);

    let unapproved = ProductFacts {
        seller_id: seller.user_id,
        is_approved: false,
    };
    assert!(access::can_view_product(&seller, &unapproved).is_ok());
    assert!(access::can_view_product(&actor(roles::CALL_CENTER_AGENT), &unapproved).is_err());
    assert!(access::can_request_product_deletion(&seller, &unapproved).is_ok());
    assert!(access::can_request_product_deletion(&actor(roles::ADMIN), &unapproved).is_err());
}

use fulfillment_engine::{
    error::AppError,
    workflow::{
        OrderState, OrderStatus, TransitionInput, TransitionTarget, WorkflowStatus, is_consistent,
        plan_transition,
    },
};

fn state(status: OrderStatus, workflow_status: WorkflowStatus) -> OrderState {
    OrderState {
        status,
        workflow_status,
        tracking_number: String::new(),
    }
}

fn status(next: OrderStatus) -> TransitionTarget {
    TransitionTarget::Status(next)
}

fn workflow(next: WorkflowStatus) -> TransitionTarget {
    TransitionTarget::Workflow(next)
}

fn complete_input() -> TransitionInput {
    TransitionInput {
        cancelled_reason: Some("customer changed mind".into()),
        tracking_number: Some("TRK-1".into()),
        escalation_reason: Some("angry customer".into()),
        ..TransitionInput::default()
    }
}

#[test]
fn confirming_moves_workflow_to_callcenter_approved() {
    let current = state(OrderStatus::Pending, WorkflowStatus::SellerSubmitted);
    let plan = plan_transition(&current, status(OrderStatus::Confirmed), &TransitionInput::default())
        .unwrap()
        .expect("plan");

    assert_eq!(plan.to_status, OrderStatus::Confirmed);
    assert_eq!(plan.to_workflow, WorkflowStatus::CallcenterApproved);
    assert!(plan.status_changed() && plan.workflow_changed());
}

#[test]
fn call_center_outcomes_put_the_order_under_review() {
    let current = state(OrderStatus::Pending, WorkflowStatus::SellerSubmitted);
    for outcome in [
        OrderStatus::NoAnswer1st,
        OrderStatus::Postponed,
        OrderStatus::CallBackLater,
        OrderStatus::InvalidNumber,
    ] {
        let plan = plan_transition(&current, status(outcome), &TransitionInput::default())
            .unwrap()
            .expect("plan");
        assert_eq!(plan.to_workflow, WorkflowStatus::CallcenterReview, "{outcome}");
    }
}

#[test]
fn re_emitting_the_current_state_is_a_no_op() {
    let current = state(OrderStatus::Processing, WorkflowStatus::CallcenterReview);
    assert!(
        plan_transition(&current, status(OrderStatus::Processing), &TransitionInput::default())
            .unwrap()
            .is_none()
    );
    assert!(
        plan_transition(
            &current,
            workflow(WorkflowStatus::CallcenterReview),
            &TransitionInput::default()
        )
        .unwrap()
        .is_none()
    );
}

#[test]
fn cancellation_requires_a_reason() {
    let current = state(OrderStatus::Pending, WorkflowStatus::SellerSubmitted);
    let err = plan_transition(&current, status(OrderStatus::Cancelled), &TransitionInput::default())
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cancelled_reason"));

    let blank = TransitionInput {
        cancelled_reason: Some("   ".into()),
        ..TransitionInput::default()
    };
    assert!(plan_transition(&current, status(OrderStatus::Cancelled), &blank).is_err());

    let plan = plan_transition(&current, status(OrderStatus::Cancelled), &complete_input())
        .unwrap()
        .expect("plan");
    assert_eq!(plan.to_workflow, WorkflowStatus::Cancelled);
    assert_eq!(plan.cancelled_reason.as_deref(), Some("customer changed mind"));
}

#[test]
fn escalation_requires_a_reason() {
    let current = state(OrderStatus::Processing, WorkflowStatus::CallcenterReview);
    let err = plan_transition(
        &current,
        status(OrderStatus::EscalateManager),
        &TransitionInput::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "escalation_reason"));

    let plan = plan_transition(&current, status(OrderStatus::EscalateManager), &complete_input())
        .unwrap()
        .expect("plan");
    assert_eq!(plan.escalation_reason.as_deref(), Some("angry customer"));
}

#[test]
fn shipping_needs_a_tracking_number_unless_one_is_stored() {
    let current = state(OrderStatus::Packaged, WorkflowStatus::ReadyForDelivery);
    let err = plan_transition(&current, status(OrderStatus::Shipped), &TransitionInput::default())
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "tracking_number"));

    let tracked = OrderState {
        tracking_number: "TRK-STORED".into(),
        ..current
    };
    let plan = plan_transition(&tracked, status(OrderStatus::Shipped), &TransitionInput::default())
        .unwrap()
        .expect("plan");
    assert_eq!(plan.to_workflow, WorkflowStatus::DeliveryInProgress);
    assert_eq!(plan.tracking_number, None);
}

#[test]
fn illegal_edges_are_refused_before_missing_fields() {
    let delivered = state(OrderStatus::Delivered, WorkflowStatus::DeliveryCompleted);
    let err = plan_transition(&delivered, status(OrderStatus::Cancelled), &TransitionInput::default())
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let confirmed = state(OrderStatus::Confirmed, WorkflowStatus::CallcenterApproved);
    let err = plan_transition(&confirmed, status(OrderStatus::Shipped), &complete_input()).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

#[test]
fn terminal_orders_do_not_move() {
    let cancelled = state(OrderStatus::Cancelled, WorkflowStatus::Cancelled);
    for next in OrderStatus::ALL.into_iter().filter(|s| *s != OrderStatus::Cancelled) {
        assert!(plan_transition(&cancelled, status(next), &complete_input()).is_err(), "{next}");
    }

    let returned = state(OrderStatus::Returned, WorkflowStatus::ReadyForDelivery);
    let err = plan_transition(
        &returned,
        workflow(WorkflowStatus::DeliveryInProgress),
        &complete_input(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

#[test]
fn workflow_steps_follow_the_pipeline() {
    let approved = state(OrderStatus::Confirmed, WorkflowStatus::CallcenterApproved);

    let pick = plan_transition(&approved, workflow(WorkflowStatus::PickAndPack), &TransitionInput::default())
        .unwrap()
        .expect("plan");
    assert_eq!(pick.to_status, OrderStatus::Confirmed);

    let skip = plan_transition(
        &approved,
        workflow(WorkflowStatus::PackagingInProgress),
        &TransitionInput::default(),
    )
    .unwrap()
    .expect("plan");
    assert_eq!(skip.to_workflow, WorkflowStatus::PackagingInProgress);

    let err = plan_transition(
        &approved,
        workflow(WorkflowStatus::DeliveryCompleted),
        &complete_input(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let ready = state(OrderStatus::Confirmed, WorkflowStatus::PackagingCompleted);
    let plan = plan_transition(&ready, workflow(WorkflowStatus::ReadyForDelivery), &TransitionInput::default())
        .unwrap()
        .expect("plan");
    assert_eq!(plan.to_status, OrderStatus::Packaged);
}

#[test]
fn every_accepted_plan_leaves_a_consistent_order() {
    let starts = [
        state(OrderStatus::Pending, WorkflowStatus::SellerSubmitted),
        state(OrderStatus::NoAnswer2nd, WorkflowStatus::CallcenterReview),
        state(OrderStatus::Confirmed, WorkflowStatus::CallcenterApproved),
        state(OrderStatus::Confirmed, WorkflowStatus::PackagingInProgress),
        state(OrderStatus::Packaged, WorkflowStatus::ReadyForDelivery),
        state(OrderStatus::Shipped, WorkflowStatus::DeliveryInProgress),
    ];
    let input = complete_input();

    for current in &starts {
        let targets = OrderStatus::ALL
            .into_iter()
            .map(TransitionTarget::Status)
            .chain(WorkflowStatus::ALL.into_iter().map(TransitionTarget::Workflow));
        for target in targets {
            if let Ok(Some(plan)) = plan_transition(current, target, &input) {
                assert!(
                    is_consistent(plan.to_status, plan.to_workflow),
                    "{:?} -> {target} gave {} / {}",
                    current,
                    plan.to_status,
                    plan.to_workflow
                );
            }
        }
    }
}

#[test]
fn both_axes_agree_on_cancelling_in_delivery() {
    let shipped = state(OrderStatus::Shipped, WorkflowStatus::DeliveryInProgress);
    let input = complete_input();

    let by_status = plan_transition(&shipped, status(OrderStatus::Cancelled), &input)
        .unwrap()
        .expect("plan");
    let by_workflow = plan_transition(&shipped, workflow(WorkflowStatus::Cancelled), &input)
        .unwrap()
        .expect("plan");
    for plan in [&by_status, &by_workflow] {
        assert_eq!(plan.to_status, OrderStatus::Cancelled);
        assert_eq!(plan.to_workflow, WorkflowStatus::Cancelled);
        assert_eq!(plan.cancelled_reason.as_deref(), Some("customer changed mind"));
    }

    let delivered = state(OrderStatus::Delivered, WorkflowStatus::DeliveryCompleted);
    for target in [status(OrderStatus::Cancelled), workflow(WorkflowStatus::Cancelled)] {
        let err = plan_transition(&delivered, target, &input).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }), "{target}");
    }
}

#[test]
fn workflow_moves_respect_the_operational_edges() {
    // A returned order is terminal operationally even though its workflow
    // stage is not.
    let returned = state(OrderStatus::Returned, WorkflowStatus::DeliveryInProgress);
    let err = plan_transition(&returned, workflow(WorkflowStatus::DeliveryCompleted), &complete_input())
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

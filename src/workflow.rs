//! Order state machine. An order carries two coupled axes, the operational
//! [`OrderStatus`] and the logistical [`WorkflowStatus`]. Callers never write
//! either field directly: they ask [`plan_transition`] for a [`TransitionPlan`]
//! and apply the whole plan (both axes, side fields, log rows) in one
//! transaction.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Packaged,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    #[serde(rename = "no_answer_1st")]
    NoAnswer1st,
    #[serde(rename = "no_answer_2nd")]
    NoAnswer2nd,
    NoAnswerFinal,
    Postponed,
    InvalidNumber,
    CallBackLater,
    EscalateManager,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 15] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Confirmed,
        OrderStatus::Packaged,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::NoAnswer1st,
        OrderStatus::NoAnswer2nd,
        OrderStatus::NoAnswerFinal,
        OrderStatus::Postponed,
        OrderStatus::InvalidNumber,
        OrderStatus::CallBackLater,
        OrderStatus::EscalateManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packaged => "packaged",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::NoAnswer1st => "no_answer_1st",
            OrderStatus::NoAnswer2nd => "no_answer_2nd",
            OrderStatus::NoAnswerFinal => "no_answer_final",
            OrderStatus::Postponed => "postponed",
            OrderStatus::InvalidNumber => "invalid_number",
            OrderStatus::CallBackLater => "call_back_later",
            OrderStatus::EscalateManager => "escalate_manager",
        }
    }

    /// Call-center sub-states reached while an agent works the order.
    pub fn is_call_center_outcome(&self) -> bool {
        matches!(
            self,
            OrderStatus::NoAnswer1st
                | OrderStatus::NoAnswer2nd
                | OrderStatus::NoAnswerFinal
                | OrderStatus::Postponed
                | OrderStatus::InvalidNumber
                | OrderStatus::CallBackLater
                | OrderStatus::EscalateManager
        )
    }

    /// States in which the call center still owns the order.
    pub fn is_in_call_center(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
            || self.is_call_center_outcome()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::validation("status", format!("unknown status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    SellerSubmitted,
    CallcenterReview,
    CallcenterApproved,
    PickAndPack,
    StockkeeperApproved,
    PackagingInProgress,
    PackagingCompleted,
    ReadyForDelivery,
    DeliveryInProgress,
    DeliveryCompleted,
    Cancelled,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 11] = [
        WorkflowStatus::SellerSubmitted,
        WorkflowStatus::CallcenterReview,
        WorkflowStatus::CallcenterApproved,
        WorkflowStatus::PickAndPack,
        WorkflowStatus::StockkeeperApproved,
        WorkflowStatus::PackagingInProgress,
        WorkflowStatus::PackagingCompleted,
        WorkflowStatus::ReadyForDelivery,
        WorkflowStatus::DeliveryInProgress,
        WorkflowStatus::DeliveryCompleted,
        WorkflowStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::SellerSubmitted => "seller_submitted",
            WorkflowStatus::CallcenterReview => "callcenter_review",
            WorkflowStatus::CallcenterApproved => "callcenter_approved",
            WorkflowStatus::PickAndPack => "pick_and_pack",
            WorkflowStatus::StockkeeperApproved => "stockkeeper_approved",
            WorkflowStatus::PackagingInProgress => "packaging_in_progress",
            WorkflowStatus::PackagingCompleted => "packaging_completed",
            WorkflowStatus::ReadyForDelivery => "ready_for_delivery",
            WorkflowStatus::DeliveryInProgress => "delivery_in_progress",
            WorkflowStatus::DeliveryCompleted => "delivery_completed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Position along the happy path; `Cancelled` sits outside it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            WorkflowStatus::SellerSubmitted => Some(0),
            WorkflowStatus::CallcenterReview => Some(1),
            WorkflowStatus::CallcenterApproved => Some(2),
            WorkflowStatus::PickAndPack => Some(3),
            WorkflowStatus::StockkeeperApproved => Some(4),
            WorkflowStatus::PackagingInProgress => Some(5),
            WorkflowStatus::PackagingCompleted => Some(6),
            WorkflowStatus::ReadyForDelivery => Some(7),
            WorkflowStatus::DeliveryInProgress => Some(8),
            WorkflowStatus::DeliveryCompleted => Some(9),
            WorkflowStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::DeliveryCompleted | WorkflowStatus::Cancelled
        )
    }

    /// Stages in which a confirmed order may sit.
    pub fn is_post_approval(&self) -> bool {
        self.rank().is_some_and(|rank| rank >= 2)
    }

    fn is_before(&self, other: WorkflowStatus) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                AppError::validation("workflow_status", format!("unknown workflow status '{s}'"))
            })
    }
}

/// Which axis the caller is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget {
    Status(OrderStatus),
    Workflow(WorkflowStatus),
}

impl TransitionTarget {
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TransitionTarget::Status(OrderStatus::Cancelled)
                | TransitionTarget::Workflow(WorkflowStatus::Cancelled)
        )
    }
}

impl fmt::Display for TransitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionTarget::Status(s) => s.fmt(f),
            TransitionTarget::Workflow(w) => w.fmt(f),
        }
    }
}

/// The order's state as far as the machine cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub workflow_status: WorkflowStatus,
    pub tracking_number: String,
}

/// Side fields that accompany a transition request.
#[derive(Debug, Clone, Default)]
pub struct TransitionInput {
    pub cancelled_reason: Option<String>,
    pub tracking_number: Option<String>,
    pub escalation_reason: Option<String>,
    pub postponed_until: Option<DateTime<Utc>>,
    pub call_back_time: Option<DateTime<Utc>>,
    pub no_answer_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub from_workflow: WorkflowStatus,
    pub to_workflow: WorkflowStatus,
    pub cancelled_reason: Option<String>,
    pub tracking_number: Option<String>,
    /// Set when the order is being escalated to a manager.
    pub escalation_reason: Option<String>,
    pub postponed_until: Option<DateTime<Utc>>,
    pub call_back_time: Option<DateTime<Utc>>,
    pub no_answer_time: Option<DateTime<Utc>>,
    pub notes: String,
}

impl TransitionPlan {
    pub fn status_changed(&self) -> bool {
        self.from_status != self.to_status
    }

    pub fn workflow_changed(&self) -> bool {
        self.from_workflow != self.to_workflow
    }
}

/// Plan a move of `current` towards `target`.
///
/// Returns `Ok(None)` when the target is the state the order is already in:
/// re-emitting a state is allowed but changes and logs nothing. Edge legality
/// is checked before required fields, so a refused edge is always an
/// `InvalidTransition` no matter what the request carried.
pub fn plan_transition(
    current: &OrderState,
    target: TransitionTarget,
    input: &TransitionInput,
) -> AppResult<Option<TransitionPlan>> {
    let (to_status, to_workflow) = match target {
        TransitionTarget::Status(next) => {
            if next == current.status {
                return Ok(None);
            }
            if !status_edge_allowed(current.status, next) {
                return Err(invalid(current.status, next));
            }
            (next, workflow_for_status(next, current.workflow_status))
        }
        TransitionTarget::Workflow(next) => {
            if next == current.workflow_status {
                return Ok(None);
            }
            let implied = status_for_workflow(next, current.status);
            if current.status.is_terminal()
                || !workflow_edge_allowed(current.workflow_status, next)
                || !status_edge_allowed(current.status, implied)
            {
                return Err(invalid(current.workflow_status, next));
            }
            (implied, next)
        }
    };

    let cancelled_reason = if to_status == OrderStatus::Cancelled {
        Some(required(&input.cancelled_reason, "cancelled_reason")?)
    } else {
        None
    };

    let tracking_number = if matches!(to_status, OrderStatus::Shipped | OrderStatus::Delivered)
        && to_status != current.status
    {
        match non_empty(&input.tracking_number) {
            Some(tracking) => Some(tracking),
            None if !current.tracking_number.trim().is_empty() => None,
            None => return Err(AppError::validation("tracking_number", "required")),
        }
    } else {
        non_empty(&input.tracking_number)
    };

    let escalation_reason = if to_status == OrderStatus::EscalateManager {
        Some(required(&input.escalation_reason, "escalation_reason")?)
    } else {
        None
    };

    Ok(Some(TransitionPlan {
        from_status: current.status,
        to_status,
        from_workflow: current.workflow_status,
        to_workflow,
        cancelled_reason,
        tracking_number,
        escalation_reason,
        postponed_until: input.postponed_until,
        call_back_time: input.call_back_time,
        no_answer_time: input.no_answer_time,
        notes: input.notes.clone().unwrap_or_default(),
    }))
}

/// Operational edges. Call-center states move freely among themselves, and
/// every state short of delivered can be cancelled.
pub fn status_edge_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from == to {
        return true;
    }
    match from {
        Cancelled | Returned => false,
        _ if from.is_in_call_center() => to.is_in_call_center() || matches!(to, Confirmed | Cancelled),
        Confirmed => matches!(to, Packaged | Cancelled),
        Packaged => matches!(to, Shipped | Cancelled | Returned),
        Shipped => matches!(to, Delivered | Cancelled | Returned),
        Delivered => matches!(to, Returned),
        _ => false,
    }
}

/// Workflow edges: the happy path (with the optional pick-and-pack detour) plus
/// cancellation from any non-terminal stage.
pub fn workflow_edge_allowed(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    use WorkflowStatus::*;
    if to == Cancelled {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (SellerSubmitted, CallcenterReview)
            | (CallcenterReview, CallcenterApproved)
            | (CallcenterApproved, PickAndPack)
            | (CallcenterApproved, PackagingInProgress)
            | (PickAndPack, StockkeeperApproved)
            | (StockkeeperApproved, PackagingInProgress)
            | (PackagingInProgress, PackagingCompleted)
            | (PackagingCompleted, ReadyForDelivery)
            | (ReadyForDelivery, DeliveryInProgress)
            | (DeliveryInProgress, DeliveryCompleted)
    )
}

/// Workflow stage implied by an operational change. The workflow never moves
/// backwards as a side effect.
pub fn workflow_for_status(status: OrderStatus, current: WorkflowStatus) -> WorkflowStatus {
    use WorkflowStatus as W;
    let advance_to = |stage: WorkflowStatus| {
        if current.is_before(stage) {
            stage
        } else {
            current
        }
    };
    match status {
        OrderStatus::Confirmed => advance_to(W::CallcenterApproved),
        OrderStatus::Packaged => advance_to(W::ReadyForDelivery),
        OrderStatus::Shipped => advance_to(W::DeliveryInProgress),
        OrderStatus::Delivered => advance_to(W::DeliveryCompleted),
        OrderStatus::Cancelled => W::Cancelled,
        OrderStatus::Returned => current,
        // Any call-center activity, postponement included, means the order is
        // under review.
        _ => advance_to(W::CallcenterReview),
    }
}

/// Operational status implied by an explicit workflow move.
pub fn status_for_workflow(workflow: WorkflowStatus, current: OrderStatus) -> OrderStatus {
    match workflow {
        WorkflowStatus::CallcenterApproved => OrderStatus::Confirmed,
        WorkflowStatus::ReadyForDelivery => OrderStatus::Packaged,
        WorkflowStatus::DeliveryInProgress => OrderStatus::Shipped,
        WorkflowStatus::DeliveryCompleted => OrderStatus::Delivered,
        WorkflowStatus::Cancelled => OrderStatus::Cancelled,
        _ => current,
    }
}

/// The cross-axis consistency rule every stored order satisfies.
pub fn is_consistent(status: OrderStatus, workflow: WorkflowStatus) -> bool {
    match status {
        OrderStatus::Confirmed => workflow.is_post_approval(),
        OrderStatus::Cancelled => workflow == WorkflowStatus::Cancelled,
        _ => true,
    }
}

fn invalid(from: impl fmt::Display, to: impl fmt::Display) -> AppError {
    AppError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &Option<String>, field: &str) -> AppResult<String> {
    non_empty(value).ok_or_else(|| AppError::validation(field, "required"))
}

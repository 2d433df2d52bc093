use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{Order, OrderAssignment, OrderItem, WorkflowLog},
    workflow::{OrderStatus, TransitionInput, WorkflowStatus},
};

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
    /// Defaults to the product's selling price.
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateOrderRequest {
    /// Generated as `#YYMMDDNNN` when absent.
    pub order_code: Option<String>,
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub customer: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub emirate: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub delivery_area: String,
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub product_link: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price_per_unit: Option<Decimal>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub internal_notes: String,
    pub order_date: Option<NaiveDate>,
    /// Staff may enter orders on behalf of a seller; ignored for sellers.
    pub seller_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub customer: Option<String>,
    pub customer_phone: Option<String>,
    pub street_address: Option<String>,
    pub shipping_address: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub country: Option<String>,
    pub emirate: Option<String>,
    pub region: Option<String>,
    pub zip_code: Option<String>,
    pub delivery_area: Option<String>,
    pub product_link: Option<String>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price_per_unit: Option<Decimal>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub order_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
    pub cancelled_reason: Option<String>,
    pub tracking_number: Option<String>,
    pub escalation_reason: Option<String>,
    pub postponed_until: Option<DateTime<Utc>>,
    pub call_back_time: Option<DateTime<Utc>>,
    pub no_answer_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl StatusChangeRequest {
    pub fn input(&self) -> TransitionInput {
        TransitionInput {
            cancelled_reason: self.cancelled_reason.clone(),
            tracking_number: self.tracking_number.clone(),
            escalation_reason: self.escalation_reason.clone(),
            postponed_until: self.postponed_until,
            call_back_time: self.call_back_time,
            no_answer_time: self.no_answer_time,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkflowAdvanceRequest {
    pub workflow_status: WorkflowStatus,
    pub cancelled_reason: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

impl WorkflowAdvanceRequest {
    pub fn input(&self) -> TransitionInput {
        TransitionInput {
            cancelled_reason: self.cancelled_reason.clone(),
            tracking_number: self.tracking_number.clone(),
            notes: self.notes.clone(),
            ..TransitionInput::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl AssignmentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPriority::Low => "low",
            AssignmentPriority::Medium => "medium",
            AssignmentPriority::High => "high",
            AssignmentPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignAgentRequest {
    pub agent_id: Uuid,
    #[serde(default)]
    pub priority: AssignmentPriority,
    pub reason: Option<String>,
    pub manager_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    /// Round-robin seeded by today's workload.
    #[default]
    Equal,
    /// Capacity weighted by recent confirmation rate.
    Performance,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentSummary {
    pub order_id: Uuid,
    pub order_code: String,
    pub agent_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistributionResult {
    pub policy: DistributionPolicy,
    pub distributed_count: usize,
    pub assignments: Vec<AssignmentSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResult {
    pub moved_count: usize,
    pub moves: Vec<BalancedOrder>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalancedOrder {
    pub order_id: Uuid,
    pub from_agent: Uuid,
    pub to_agent: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Newest first.
    pub history: Vec<WorkflowLog>,
    pub assignment: Option<OrderAssignment>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}

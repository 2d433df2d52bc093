use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::workflow::{OrderStatus, WorkflowStatus};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub approval_status: String,
    pub email_verified: bool,
    pub force_password_change: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub role_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub is_protected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: Role,
    pub member_count: i64,
    pub permission_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub permission_type: String,
    pub module: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserRoleBinding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name_en: String,
    pub name_ar: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub product_variant: Option<String>,
    #[schema(value_type = String)]
    pub selling_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub purchase_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub image_handle: Option<String>,
    pub product_link: Option<String>,
    pub seller_id: Uuid,
    pub is_approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub warehouse_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductDeletionRequest {
    pub id: Uuid,
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub reason: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_code: String,
    pub customer: String,
    pub customer_phone: String,
    pub street_address: String,
    pub shipping_address: String,
    pub city: String,
    pub area: String,
    pub country: String,
    pub emirate: String,
    pub region: String,
    pub zip_code: String,
    pub delivery_area: String,
    pub product_id: Option<Uuid>,
    pub product_link: String,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price_per_unit: Decimal,
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub workflow_status: WorkflowStatus,
    pub seller_id: Option<Uuid>,
    pub seller_email: String,
    pub agent_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub escalated_to_manager: bool,
    pub escalated_by: Option<Uuid>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: String,
    pub postponed_until: Option<DateTime<Utc>>,
    pub call_back_time: Option<DateTime<Utc>>,
    pub no_answer_time: Option<DateTime<Utc>>,
    pub tracking_number: String,
    pub cancelled_reason: String,
    pub notes: String,
    pub internal_notes: String,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub from_workflow_status: String,
    pub to_workflow_status: String,
    pub actor_id: Option<Uuid>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub agent_id: Uuid,
    pub manager_id: Option<Uuid>,
    pub previous_agent_id: Option<Uuid>,
    pub priority: String,
    pub assignment_reason: String,
    pub manager_notes: String,
    pub assignment_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentWorkload {
    pub agent_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub availability: String,
    /// Orders assigned today.
    pub assigned_today: u32,
    /// Today's assignments still pending, processing or confirmed.
    pub active_today: u32,
    pub performance_score: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkloadSummary {
    pub business_date: NaiveDate,
    pub unassigned_orders: u64,
    pub agents: Vec<AgentWorkload>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentSession {
    pub agent_id: Uuid,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
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
    pub price_per_unit: Decimal,
    pub total_price: Decimal,
    pub status: String,
    pub workflow_status: String,
    pub seller_id: Option<Uuid>,
    pub seller_email: String,
    pub agent_id: Option<Uuid>,
    pub assigned_at: Option<DateTimeWithTimeZone>,
    pub escalated_to_manager: bool,
    pub escalated_by: Option<Uuid>,
    pub escalated_at: Option<DateTimeWithTimeZone>,
    pub escalation_reason: String,
    pub postponed_until: Option<DateTimeWithTimeZone>,
    pub call_back_time: Option<DateTimeWithTimeZone>,
    pub no_answer_time: Option<DateTimeWithTimeZone>,
    pub tracking_number: String,
    pub cancelled_reason: String,
    pub notes: String,
    pub internal_notes: String,
    pub order_date: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id"
    )]
    Products,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_one = "super::order_assignments::Entity")]
    Assignment,
    #[sea_orm(has_many = "super::order_workflow_logs::Entity")]
    WorkflowLogs,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl Related<super::order_workflow_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkflowLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

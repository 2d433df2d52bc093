use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    calendar::DateBucket,
    dto::orders::DistributionPolicy,
    workflow::{OrderStatus, WorkflowStatus},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderSortBy {
    CreatedAt,
    OrderDate,
    TotalPrice,
    OrderCode,
    Customer,
    Status,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Matches code, customer, customer phone, seller email, product name and notes.
    pub q: Option<String>,
    pub status: Option<OrderStatus>,
    pub workflow_status: Option<WorkflowStatus>,
    pub seller_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub emirate: Option<String>,
    pub date: Option<DateBucket>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub sort_by: Option<OrderSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
    Code,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Matches code, English and Arabic names.
    pub q: Option<String>,
    pub is_approved: Option<bool>,
    pub seller_id: Option<Uuid>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeletionRequestQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub approval_status: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistributeQuery {
    /// `equal` when absent.
    pub policy: Option<DistributionPolicy>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportQuery {
    /// Seller the imported orders belong to; staff only.
    pub seller_id: Option<Uuid>,
}

/// Query strings carry their own `page`/`per_page` pair.
pub trait Paged {
    fn page_params(&self) -> (Option<i64>, Option<i64>);

    fn pagination(&self) -> Pagination {
        let (page, per_page) = self.page_params();
        Pagination { page, per_page }
    }
}

macro_rules! paged {
    ($($ty:ty),*) => {
        $(impl Paged for $ty {
            fn page_params(&self) -> (Option<i64>, Option<i64>) {
                (self.page, self.per_page)
            }
        })*
    };
}

paged!(OrderListQuery, ProductQuery, DeletionRequestQuery, AuditLogQuery, UserQuery);

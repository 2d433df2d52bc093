use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Product, ProductDeletionRequest};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub name_en: String,
    #[serde(default)]
    pub name_ar: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub product_variant: Option<String>,
    #[schema(value_type = String)]
    pub selling_price: Decimal,
    #[schema(value_type = Option<String>)]
    pub purchase_price: Option<Decimal>,
    #[validate(range(min = 0, message = "must not be negative"))]
    #[serde(default)]
    pub stock_quantity: i32,
    pub image_handle: Option<String>,
    pub product_link: Option<String>,
    pub warehouse_id: Option<Uuid>,
    /// Admins may list on behalf of a seller; ignored for sellers.
    pub seller_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub product_variant: Option<String>,
    #[schema(value_type = Option<String>)]
    pub selling_price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub purchase_price: Option<Decimal>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub stock_quantity: Option<i32>,
    pub image_handle: Option<String>,
    pub product_link: Option<String>,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DeletionRequestPayload {
    #[validate(length(min = 1, message = "is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeletionDecision {
    Approved,
    Rejected,
}

impl DeletionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionDecision::Approved => "approved",
            DeletionDecision::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDeletionRequest {
    pub decision: DeletionDecision,
    pub admin_notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct DeletionRequestList {
    #[schema(value_type = Vec<ProductDeletionRequest>)]
    pub items: Vec<ProductDeletionRequest>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Permission, RoleSummary, UserRoleBinding};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[serde(default = "default_role_type")]
    pub role_type: String,
    pub description: Option<String>,
}

fn default_role_type() -> String {
    "custom".to_string()
}

#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRolePermissionsRequest {
    /// The complete granted set; permissions not listed are revoked.
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolePermissionsResult {
    pub role_id: Uuid,
    pub granted: Vec<Uuid>,
    pub revoked: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub code: String,
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    /// One of create, read, update, delete, export, import, approve, reject, assign, manage.
    pub permission_type: String,
    #[validate(length(min = 1, message = "required"))]
    pub module: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
    #[serde(default)]
    pub is_primary: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleList {
    pub items: Vec<RoleSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionList {
    pub items: Vec<Permission>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserRoleList {
    pub items: Vec<UserRoleBinding>,
}

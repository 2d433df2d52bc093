use serde::Serialize;
use utoipa::ToSchema;

use crate::models::AuditLog;

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct AuditLogList {
    #[schema(value_type = Vec<AuditLog>)]
    pub items: Vec<AuditLog>,
}

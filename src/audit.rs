use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{access::Actor, entity::audit_logs, error::AppResult};

pub mod actions {
    pub const STATUS_CHANGE: &str = "status_change";
    pub const ORDER_CREATED: &str = "order_created";
    pub const ORDER_UPDATED: &str = "order_updated";
    pub const ORDER_DELETED: &str = "order_deleted";
    pub const ORDER_ITEM_ADDED: &str = "order_item_added";
    pub const ORDER_ITEM_REMOVED: &str = "order_item_removed";
    pub const ORDER_ASSIGNED: &str = "order_assigned";
    pub const ORDER_REASSIGNED: &str = "order_reassigned";
    pub const ORDERS_BALANCED: &str = "orders_balanced";
    pub const ORDERS_IMPORTED: &str = "orders_imported";
    pub const EXPORT: &str = "export";
    pub const PRODUCT_CREATED: &str = "product_created";
    pub const PRODUCT_UPDATED: &str = "product_updated";
    pub const PRODUCT_APPROVED: &str = "product_approved";
    pub const PRODUCT_REJECTED: &str = "product_rejected";
    pub const PRODUCT_DELETED: &str = "product_deleted";
    pub const PRODUCT_DELETION_REQUESTED: &str = "product_deletion_requested";
    pub const PRODUCT_DELETION_REJECTED: &str = "product_deletion_rejected";
    pub const ROLE_CREATED: &str = "role_created";
    pub const ROLE_UPDATED: &str = "role_updated";
    pub const ROLE_DELETED: &str = "role_deleted";
    pub const PERMISSION_CREATED: &str = "permission_created";
    pub const PERMISSION_GRANTED: &str = "permission_granted";
    pub const PERMISSION_REVOKED: &str = "permission_revoked";
    pub const USER_ROLE_ASSIGNED: &str = "user_role_assigned";
    pub const USER_ROLE_REMOVED: &str = "user_role_removed";
    pub const USER_CREATED: &str = "user_created";
    pub const USER_UPDATED: &str = "user_updated";
    pub const USER_DELETED: &str = "user_deleted";
    pub const AGENT_STATUS: &str = "agent_status_changed";
}

/// One audit row, built up before it is appended.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: &'static str, entity_type: &'static str, entity_id: impl ToString) -> Self {
        Self {
            actor_id: None,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            description: String::new(),
            ip_address: None,
            user_agent: None,
            metadata: None,
        }
    }

    /// Stamp the acting user and the client they called from.
    pub fn by(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.user_id);
        self.ip_address = actor.client.ip.clone();
        self.user_agent = actor.client.user_agent.clone();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Append inside the caller's transaction so the row commits or rolls back
/// with the change it describes.
pub async fn append<C: ConnectionTrait>(conn: &C, entry: AuditEntry) -> AppResult<()> {
    let row = audit_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        actor_id: Set(entry.actor_id),
        action: Set(entry.action.to_string()),
        entity_type: Set(entry.entity_type.to_string()),
        entity_id: Set(entry.entity_id),
        description: Set(entry.description),
        ip_address: Set(entry.ip_address),
        user_agent: Set(entry.user_agent),
        metadata: Set(entry.metadata),
        created_at: NotSet,
    };
    row.insert(conn).await?;
    Ok(())
}

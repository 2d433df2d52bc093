pub mod agent_sessions;
pub mod audit_logs;
pub mod order_assignments;
pub mod order_items;
pub mod order_workflow_logs;
pub mod orders;
pub mod permissions;
pub mod product_deletion_requests;
pub mod products;
pub mod role_permissions;
pub mod roles;
pub mod user_roles;
pub mod users;

pub use agent_sessions::Entity as AgentSessions;
pub use audit_logs::Entity as AuditLogs;
pub use order_assignments::Entity as OrderAssignments;
pub use order_items::Entity as OrderItems;
pub use order_workflow_logs::Entity as OrderWorkflowLogs;
pub use orders::Entity as Orders;
pub use permissions::Entity as Permissions;
pub use product_deletion_requests::Entity as ProductDeletionRequests;
pub use products::Entity as Products;
pub use role_permissions::Entity as RolePermissions;
pub use roles::Entity as Roles;
pub use user_roles::Entity as UserRoles;
pub use users::Entity as Users;

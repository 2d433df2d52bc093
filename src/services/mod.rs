pub mod agent_service;
pub mod assignment_service;
pub mod audit_service;
pub mod import_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod role_service;
pub mod user_service;
pub mod workflow_service;

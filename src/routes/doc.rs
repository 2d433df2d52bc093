use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    calendar::DateBucket,
    dto::{
        agents::{AgentAvailability, SetAgentStatusRequest},
        audit::AuditLogList,
        orders::{
            AssignAgentRequest, AssignmentPriority, AssignmentSummary, BalanceResult,
            BalancedOrder, CreateOrderRequest, DistributionPolicy, DistributionResult,
            OrderDetail, OrderItemInput, OrderList, StatusChangeRequest, UpdateOrderRequest,
            WorkflowAdvanceRequest,
        },
        products::{
            CreateProductRequest, DeletionDecision, DeletionRequestList, DeletionRequestPayload,
            ProductList, ResolveDeletionRequest, UpdateProductRequest,
        },
        roles::{
            AssignRoleRequest, CreatePermissionRequest, CreateRoleRequest, PermissionList,
            RoleList, RolePermissionsResult, SetRolePermissionsRequest, UpdateRoleRequest,
            UserRoleList,
        },
        users::{ApprovalDecision, CreateUserRequest, SetActiveRequest, SetApprovalRequest, UserList},
    },
    error::ErrorData,
    import::{ImportReport, ImportRowError},
    models::{
        AgentSession, AgentWorkload, AuditLog, Order, OrderAssignment, OrderItem, Permission,
        Product, ProductDeletionRequest, Role, RoleSummary, User, UserRoleBinding, WorkflowLog,
        WorkloadSummary,
    },
    response::{ApiResponse, Meta},
    routes::{agents, audit, health, orders, params, products, roles, users},
    workflow::{OrderStatus, WorkflowStatus},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        orders::change_status,
        orders::advance_workflow,
        orders::assign_agent,
        orders::distribute_orders,
        orders::balance_orders,
        orders::add_item,
        orders::remove_item,
        orders::export_orders,
        orders::import_orders,
        agents::set_status,
        agents::workload,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::approve_product,
        products::reject_product,
        products::request_deletion,
        products::list_deletion_requests,
        products::resolve_deletion,
        roles::list_roles,
        roles::create_role,
        roles::update_role,
        roles::delete_role,
        roles::set_role_permissions,
        roles::list_permissions,
        roles::create_permission,
        users::list_users,
        users::create_user,
        users::set_approval,
        users::set_active,
        users::delete_user,
        users::list_user_roles,
        users::assign_role,
        users::revoke_role,
        audit::list_audit_logs,
        audit::export_audit_logs
    ),
    components(
        schemas(
            User,
            Role,
            RoleSummary,
            Permission,
            UserRoleBinding,
            Product,
            ProductDeletionRequest,
            Order,
            OrderItem,
            OrderAssignment,
            WorkflowLog,
            AuditLog,
            AgentSession,
            AgentWorkload,
            WorkloadSummary,
            OrderStatus,
            WorkflowStatus,
            DateBucket,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderItemInput,
            StatusChangeRequest,
            WorkflowAdvanceRequest,
            AssignAgentRequest,
            AssignmentPriority,
            DistributionPolicy,
            AssignmentSummary,
            DistributionResult,
            BalanceResult,
            BalancedOrder,
            OrderDetail,
            OrderList,
            AgentAvailability,
            SetAgentStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            DeletionRequestPayload,
            DeletionDecision,
            ResolveDeletionRequest,
            ProductList,
            DeletionRequestList,
            CreateRoleRequest,
            UpdateRoleRequest,
            SetRolePermissionsRequest,
            RolePermissionsResult,
            CreatePermissionRequest,
            AssignRoleRequest,
            RoleList,
            PermissionList,
            UserRoleList,
            CreateUserRequest,
            ApprovalDecision,
            SetApprovalRequest,
            SetActiveRequest,
            UserList,
            AuditLogList,
            ImportReport,
            ImportRowError,
            ErrorData,
            params::Pagination,
            params::SortOrder,
            params::OrderSortBy,
            params::ProductSortBy,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ImportReport>,
            ApiResponse<WorkloadSummary>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order lifecycle, import and export"),
        (name = "Assignment", description = "Agent assignment, distribution and workload"),
        (name = "Products", description = "Catalog and deletion review"),
        (name = "Roles", description = "Role and permission registry"),
        (name = "Users", description = "User administration and role bindings"),
        (name = "Audit", description = "Append-only audit log"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

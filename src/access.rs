//! Authorization decisions. The request extractor builds an [`Actor`] from the
//! role and permission lookup views; every function here is a pure decision over
//! that actor and the facts of the target entity.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    workflow::{OrderStatus, TransitionTarget, WorkflowStatus},
};

pub mod roles {
    pub const SUPER_ADMIN: &str = "Super Admin";
    pub const ADMIN: &str = "Admin";
    pub const SELLER: &str = "Seller";
    pub const ACCOUNTANT: &str = "Accountant";
    pub const CALL_CENTER_AGENT: &str = "Call Center Agent";
    pub const CALL_CENTER_MANAGER: &str = "Call Center Manager";
    pub const DELIVERY_AGENT: &str = "Delivery Agent";
    pub const DELIVERY_MANAGER: &str = "Delivery Manager";
    pub const STOCK_KEEPER: &str = "Stock Keeper";
    pub const PACKAGING_AGENT: &str = "Packaging Agent";

    pub const SYSTEM_ROLES: [&str; 10] = [
        SUPER_ADMIN,
        ADMIN,
        SELLER,
        ACCOUNTANT,
        CALL_CENTER_AGENT,
        CALL_CENTER_MANAGER,
        DELIVERY_AGENT,
        DELIVERY_MANAGER,
        STOCK_KEEPER,
        PACKAGING_AGENT,
    ];

    /// Roles that must keep at least one member.
    pub fn must_keep_member(name: &str) -> bool {
        name == SUPER_ADMIN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// The authenticated caller with their effective roles and permissions.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub is_superuser: bool,
    /// Active role names, primary first.
    pub roles: Vec<String>,
    /// Granted `(code, module)` pairs.
    pub permissions: HashSet<(String, String)>,
    pub client: ClientInfo,
}

impl Actor {
    pub fn new(user_id: Uuid, roles: &[&str]) -> Self {
        Self {
            user_id,
            email: String::new(),
            is_superuser: false,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: HashSet::new(),
            client: ClientInfo::default(),
        }
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r == name)
    }

    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }

    pub fn is_super_admin(&self) -> bool {
        self.is_superuser || self.has_role(roles::SUPER_ADMIN)
    }

    pub fn is_admin(&self) -> bool {
        self.is_super_admin() || self.has_role(roles::ADMIN)
    }

    pub fn is_call_center_manager(&self) -> bool {
        self.has_role(roles::CALL_CENTER_MANAGER)
    }

    pub fn is_call_center_agent(&self) -> bool {
        self.has_role(roles::CALL_CENTER_AGENT)
    }

    pub fn is_seller(&self) -> bool {
        self.has_role(roles::SELLER)
    }

    pub fn is_delivery(&self) -> bool {
        self.has_role(roles::DELIVERY_AGENT) || self.has_role(roles::DELIVERY_MANAGER)
    }

    /// Super Admin holds every permission without rows backing it.
    pub fn has_permission(&self, code: &str, module: Option<&str>) -> bool {
        self.is_super_admin()
            || self
                .permissions
                .iter()
                .any(|(c, m)| c == code && module.is_none_or(|wanted| wanted == m))
    }
}

/// Named capabilities carried by `PermissionDenied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ListOrders,
    ViewOrder,
    CreateOrder,
    EditOrder,
    EditConfirmedOrder,
    DeleteOrder,
    ReassignAgent,
    ChangeStatus,
    CancelOrder,
    AdvanceWorkflow,
    DistributeOrders,
    ImportOrders,
    ExportData,
    ManageRoles,
    ManageUsers,
    DeleteUser,
    ViewProduct,
    CreateProduct,
    EditProduct,
    ApproveProduct,
    RequestProductDeletion,
    ResolveProductDeletion,
    ViewAuditLog,
    SetAgentStatus,
    ViewWorkload,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ListOrders => "list_orders",
            Capability::ViewOrder => "view_order",
            Capability::CreateOrder => "create_order",
            Capability::EditOrder => "edit_order",
            Capability::EditConfirmedOrder => "edit_confirmed_order",
            Capability::DeleteOrder => "delete_order",
            Capability::ReassignAgent => "reassign_agent",
            Capability::ChangeStatus => "change_status",
            Capability::CancelOrder => "cancel_order",
            Capability::AdvanceWorkflow => "advance_workflow",
            Capability::DistributeOrders => "distribute_orders",
            Capability::ImportOrders => "import_orders",
            Capability::ExportData => "export_data",
            Capability::ManageRoles => "manage_roles",
            Capability::ManageUsers => "manage_users",
            Capability::DeleteUser => "delete_user",
            Capability::ViewProduct => "view_product",
            Capability::CreateProduct => "create_product",
            Capability::EditProduct => "edit_product",
            Capability::ApproveProduct => "approve_product",
            Capability::RequestProductDeletion => "request_product_deletion",
            Capability::ResolveProductDeletion => "resolve_product_deletion",
            Capability::ViewAuditLog => "view_audit_log",
            Capability::SetAgentStatus => "set_agent_status",
            Capability::ViewWorkload => "view_workload",
        }
    }
}

fn require(allowed: bool, capability: Capability) -> AppResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::denied(capability.as_str()))
    }
}

/// What the gate needs to know about an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFacts {
    pub seller_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub status: OrderStatus,
    pub workflow_status: WorkflowStatus,
}

impl OrderFacts {
    fn owned_by(&self, actor: &Actor) -> bool {
        self.seller_id == Some(actor.user_id)
    }

    fn assigned_to(&self, actor: &Actor) -> bool {
        self.agent_id == Some(actor.user_id)
    }
}

/// One slice of the order table an actor may see. An actor's visible set is
/// the union of its scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderScope {
    All,
    AssignedTo(Uuid),
    OwnedBy(Uuid),
    Stages(Vec<WorkflowStatus>),
}

impl OrderScope {
    pub fn contains(&self, order: &OrderFacts) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::AssignedTo(agent) => order.agent_id == Some(*agent),
            OrderScope::OwnedBy(seller) => order.seller_id == Some(*seller),
            OrderScope::Stages(stages) => stages.contains(&order.workflow_status),
        }
    }
}

const STOCK_STAGES: [WorkflowStatus; 3] = [
    WorkflowStatus::CallcenterApproved,
    WorkflowStatus::PickAndPack,
    WorkflowStatus::StockkeeperApproved,
];
const PACKAGING_STAGES: [WorkflowStatus; 4] = [
    WorkflowStatus::CallcenterApproved,
    WorkflowStatus::StockkeeperApproved,
    WorkflowStatus::PackagingInProgress,
    WorkflowStatus::PackagingCompleted,
];
const DELIVERY_STAGES: [WorkflowStatus; 3] = [
    WorkflowStatus::ReadyForDelivery,
    WorkflowStatus::DeliveryInProgress,
    WorkflowStatus::DeliveryCompleted,
];

/// Visible order slices. Fails with `list_orders` when the actor sees nothing.
pub fn order_scopes(actor: &Actor) -> AppResult<Vec<OrderScope>> {
    if actor.is_admin() || actor.is_call_center_manager() {
        return Ok(vec![OrderScope::All]);
    }
    let mut scopes = Vec::new();
    if actor.is_call_center_agent() {
        scopes.push(OrderScope::AssignedTo(actor.user_id));
    }
    if actor.is_seller() {
        scopes.push(OrderScope::OwnedBy(actor.user_id));
    }
    let mut stages: Vec<WorkflowStatus> = Vec::new();
    let stage_roles: [(bool, &[WorkflowStatus]); 3] = [
        (actor.has_role(roles::STOCK_KEEPER), &STOCK_STAGES),
        (actor.has_role(roles::PACKAGING_AGENT), &PACKAGING_STAGES),
        (actor.is_delivery(), &DELIVERY_STAGES),
    ];
    for (held, role_stages) in stage_roles {
        if !held {
            continue;
        }
        for stage in role_stages {
            if !stages.contains(stage) {
                stages.push(*stage);
            }
        }
    }
    if !stages.is_empty() {
        scopes.push(OrderScope::Stages(stages));
    }
    require(!scopes.is_empty(), Capability::ListOrders)?;
    Ok(scopes)
}

pub fn can_view_order(actor: &Actor, order: &OrderFacts) -> AppResult<()> {
    let scopes = order_scopes(actor)?;
    require(
        scopes.iter().any(|scope| scope.contains(order)),
        Capability::ViewOrder,
    )
}

pub fn can_create_order(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin()
            || actor.is_call_center_manager()
            || actor.is_call_center_agent()
            || actor.is_seller(),
        Capability::CreateOrder,
    )
}

pub fn can_edit_order(actor: &Actor, order: &OrderFacts) -> AppResult<()> {
    if actor.is_super_admin() {
        return Ok(());
    }
    require(
        order.status != OrderStatus::Confirmed,
        Capability::EditConfirmedOrder,
    )?;
    let review_stage = matches!(
        order.workflow_status,
        WorkflowStatus::SellerSubmitted | WorkflowStatus::CallcenterReview
    );
    let allowed = actor.is_admin()
        || (actor.is_call_center_manager() && review_stage)
        || (actor.is_call_center_agent()
            && order.assigned_to(actor)
            && order.status.is_in_call_center())
        || (actor.is_seller()
            && order.owned_by(actor)
            && matches!(order.status, OrderStatus::Pending | OrderStatus::Processing));
    require(allowed, Capability::EditOrder)
}

pub fn can_delete_order(actor: &Actor, order: &OrderFacts) -> AppResult<()> {
    require(
        actor.is_super_admin()
            || (actor.is_seller()
                && order.owned_by(actor)
                && order.status == OrderStatus::Pending),
        Capability::DeleteOrder,
    )
}

pub fn can_reassign(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin() || actor.is_call_center_manager(),
        Capability::ReassignAgent,
    )
}

pub fn can_distribute(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin() || actor.is_call_center_manager(),
        Capability::DistributeOrders,
    )
}

pub fn can_view_workload(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin() || actor.is_call_center_manager(),
        Capability::ViewWorkload,
    )
}

/// Whether the actor may move the order to `target`. Visibility is checked
/// first, so agents act only on their own assignments.
pub fn can_transition(actor: &Actor, order: &OrderFacts, target: TransitionTarget) -> AppResult<()> {
    can_view_order(actor, order)?;
    if actor.is_admin() {
        return Ok(());
    }
    let call_center = actor.is_call_center_manager() || actor.is_call_center_agent();

    if target.is_cancellation() {
        return require(call_center, Capability::CancelOrder);
    }

    match target {
        TransitionTarget::Status(next) => {
            let allowed = (call_center
                && (next.is_in_call_center() || next == OrderStatus::Confirmed))
                || (actor.has_role(roles::PACKAGING_AGENT) && next == OrderStatus::Packaged)
                || (actor.is_delivery()
                    && matches!(
                        next,
                        OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Returned
                    ));
            require(allowed, Capability::ChangeStatus)
        }
        TransitionTarget::Workflow(next) => {
            use WorkflowStatus::*;
            let allowed = (call_center && matches!(next, CallcenterReview | CallcenterApproved))
                || (actor.has_role(roles::STOCK_KEEPER)
                    && matches!(next, PickAndPack | StockkeeperApproved))
                || (actor.has_role(roles::PACKAGING_AGENT)
                    && matches!(
                        next,
                        PackagingInProgress | PackagingCompleted | ReadyForDelivery
                    ))
                || (actor.is_delivery() && matches!(next, DeliveryInProgress | DeliveryCompleted));
            require(allowed, Capability::AdvanceWorkflow)
        }
    }
}

pub fn can_import(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin() || actor.is_seller() || actor.is_call_center_manager(),
        Capability::ImportOrders,
    )
}

/// Export is reserved to Super Admin whatever module permissions say.
pub fn can_export(actor: &Actor) -> AppResult<()> {
    require(actor.is_super_admin(), Capability::ExportData)
}

pub fn can_manage_roles(actor: &Actor) -> AppResult<()> {
    require(actor.is_super_admin(), Capability::ManageRoles)
}

pub fn can_manage_users(actor: &Actor) -> AppResult<()> {
    require(actor.is_admin(), Capability::ManageUsers)
}

pub fn can_delete_user(actor: &Actor) -> AppResult<()> {
    require(actor.is_super_admin(), Capability::DeleteUser)
}

pub fn can_view_audit_log(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_admin() || actor.has_permission("audit_logs.read", None),
        Capability::ViewAuditLog,
    )
}

pub fn can_set_agent_status(actor: &Actor) -> AppResult<()> {
    require(
        actor.is_call_center_agent() || actor.is_call_center_manager(),
        Capability::SetAgentStatus,
    )
}

/// What the gate needs to know about a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductFacts {
    pub seller_id: Uuid,
    pub is_approved: bool,
}

/// Catalog visibility: admins see everything, sellers their own listings, and
/// other staff only approved products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope {
    All,
    OwnedBy(Uuid),
    Approved,
}

pub fn product_scope(actor: &Actor) -> ProductScope {
    if actor.is_admin() {
        ProductScope::All
    } else if actor.is_seller() {
        ProductScope::OwnedBy(actor.user_id)
    } else {
        ProductScope::Approved
    }
}

pub fn can_view_product(actor: &Actor, product: &ProductFacts) -> AppResult<()> {
    let visible = match product_scope(actor) {
        ProductScope::All => true,
        ProductScope::OwnedBy(seller) => product.seller_id == seller,
        ProductScope::Approved => product.is_approved,
    };
    require(visible, Capability::ViewProduct)
}

pub fn can_create_product(actor: &Actor) -> AppResult<()> {
    require(actor.is_admin() || actor.is_seller(), Capability::CreateProduct)
}

pub fn can_edit_product(actor: &Actor, product: &ProductFacts) -> AppResult<()> {
    require(
        actor.is_admin() || (actor.is_seller() && product.seller_id == actor.user_id),
        Capability::EditProduct,
    )
}

pub fn can_approve_product(actor: &Actor) -> AppResult<()> {
    require(actor.is_admin(), Capability::ApproveProduct)
}

pub fn can_request_product_deletion(actor: &Actor, product: &ProductFacts) -> AppResult<()> {
    require(
        actor.is_seller() && product.seller_id == actor.user_id,
        Capability::RequestProductDeletion,
    )
}

pub fn can_resolve_product_deletion(actor: &Actor) -> AppResult<()> {
    require(actor.is_admin(), Capability::ResolveProductDeletion)
}

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
    sea_query::{Expr, LockType},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    access::{self, Actor, roles},
    audit::{self, AuditEntry, actions},
    calendar::BusinessCalendar,
    dispatch::{self, AgentAssignments, AgentLoad, AgentPerformance},
    dto::orders::{
        AssignAgentRequest, AssignmentPriority, AssignmentSummary, BalanceResult, BalancedOrder,
        DistributionPolicy, DistributionResult,
    },
    entity::{
        order_assignments::{self, Entity as OrderAssignments, Model as AssignmentModel},
        orders::{self, Entity as Orders, Model as OrderModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{AgentWorkload, OrderAssignment, WorkloadSummary},
    notify::{Notice, NotificationKind},
    response::{ApiResponse, Meta},
    services::{notification_service, role_service},
    state::AppState,
    workflow::OrderStatus,
};

const UNASSIGNED_STATUSES: [&str; 2] = ["pending", "processing"];
const ACTIVE_STATUSES: [&str; 3] = ["pending", "processing", "confirmed"];
const PERFORMANCE_WINDOW_DAYS: i64 = 2;

/// A call-center agent eligible for dispatch.
#[derive(Debug, Clone, FromQueryResult)]
pub struct PoolAgent {
    pub agent_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub availability: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct AgentCounts {
    agent_id: Uuid,
    total: i64,
    matching: i64,
}

#[derive(Debug, FromQueryResult)]
struct UserId {
    id: Uuid,
}

/// Active users with an effective Call Center Agent binding, in stable pool
/// order. Agents whose session says `offline` are left out unless asked for.
pub async fn agent_pool<C: ConnectionTrait>(conn: &C, include_offline: bool) -> AppResult<Vec<PoolAgent>> {
    let sql = r#"
        SELECT u.id AS agent_id, u.email, u.full_name, s.status AS availability
        FROM users u
        JOIN user_active_roles r ON r.user_id = u.id AND r.role_name = $1
        LEFT JOIN agent_sessions s ON s.agent_id = u.id
        WHERE u.is_active AND ($2 OR COALESCE(s.status, 'available') <> 'offline')
        ORDER BY u.created_at, u.email
    "#;
    let rows = PoolAgent::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        [roles::CALL_CENTER_AGENT.into(), include_offline.into()],
    ))
    .all(conn)
    .await?;
    Ok(rows)
}

/// Per agent: assignments dated in `[since, until)`, and how many of those
/// orders sit in one of `statuses`.
async fn assignment_counts<C: ConnectionTrait>(
    conn: &C,
    since: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
    statuses: &[&str],
) -> AppResult<HashMap<Uuid, (u32, u32)>> {
    let sql = r#"
        SELECT a.agent_id,
               COUNT(*)::BIGINT AS total,
               COUNT(*) FILTER (WHERE o.status = ANY(string_to_array($3, ',')))::BIGINT AS matching
        FROM order_assignments a
        JOIN orders o ON o.id = a.order_id
        WHERE a.assignment_date >= $1 AND ($2::TIMESTAMPTZ IS NULL OR a.assignment_date < $2)
        GROUP BY a.agent_id
    "#;
    let statuses = statuses.join(",");
    let rows = AgentCounts::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        [
            since.fixed_offset().into(),
            until.map(|t| t.fixed_offset()).into(),
            statuses.into(),
        ],
    ))
    .all(conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.agent_id, (r.total.max(0) as u32, r.matching.max(0) as u32)))
        .collect())
}

async fn loads<C: ConnectionTrait>(
    conn: &C,
    calendar: &BusinessCalendar,
    pool: &[PoolAgent],
) -> AppResult<Vec<AgentLoad>> {
    let today = calendar.today_range(Utc::now());
    let counts = assignment_counts(conn, today.start, today.end, &ACTIVE_STATUSES).await?;
    Ok(pool
        .iter()
        .map(|agent| AgentLoad {
            agent_id: agent.agent_id,
            workload: counts.get(&agent.agent_id).map(|c| c.0).unwrap_or(0),
        })
        .collect())
}

async fn performance<C: ConnectionTrait>(
    conn: &C,
    calendar: &BusinessCalendar,
    pool: &[PoolAgent],
) -> AppResult<Vec<AgentPerformance>> {
    let now = Utc::now();
    let today = calendar.today_range(now);
    let active = assignment_counts(conn, today.start, today.end, &ACTIVE_STATUSES).await?;
    let window_start = now - TimeDelta::days(PERFORMANCE_WINDOW_DAYS);
    let recent = assignment_counts(conn, window_start, None, &[OrderStatus::Confirmed.as_str()]).await?;
    Ok(pool
        .iter()
        .map(|agent| {
            let (recent_total, recent_confirmed) = recent.get(&agent.agent_id).copied().unwrap_or((0, 0));
            AgentPerformance {
                agent_id: agent.agent_id,
                active_workload: active.get(&agent.agent_id).map(|c| c.1).unwrap_or(0),
                recent_total,
                recent_confirmed,
            }
        })
        .collect())
}

/// The first Call Center Manager, else the first superuser.
pub async fn default_manager<C: ConnectionTrait>(conn: &C) -> AppResult<Option<Uuid>> {
    let sql = r#"
        SELECT u.id FROM users u
        JOIN user_active_roles r ON r.user_id = u.id AND r.role_name = $1
        WHERE u.is_active
        ORDER BY u.created_at
        LIMIT 1
    "#;
    let manager = UserId::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        [roles::CALL_CENTER_MANAGER.into()],
    ))
    .one(conn)
    .await?;
    if let Some(manager) = manager {
        return Ok(Some(manager.id));
    }
    let superuser = Users::find()
        .filter(crate::entity::users::Column::IsSuperuser.eq(true))
        .filter(crate::entity::users::Column::IsActive.eq(true))
        .order_by_asc(crate::entity::users::Column::CreatedAt)
        .one(conn)
        .await?;
    Ok(superuser.map(|u| u.id))
}

/// Parameters of one assignment write.
#[derive(Debug, Clone)]
pub struct AssignmentWrite {
    pub agent_id: Uuid,
    pub manager_id: Option<Uuid>,
    pub priority: AssignmentPriority,
    pub reason: String,
    pub manager_notes: String,
}

/// Point the order at `write.agent_id` and upsert its assignment row.
///
/// The order update is a compare-and-set on the agent the caller last saw;
/// losing the race is a `Conflict` and nothing is written.
pub async fn write_assignment<C: ConnectionTrait>(
    conn: &C,
    order: &OrderModel,
    write: &AssignmentWrite,
) -> AppResult<AssignmentModel> {
    let now = Utc::now().fixed_offset();
    let mut update = Orders::update_many()
        .col_expr(orders::Column::AgentId, Expr::value(Some(write.agent_id)))
        .col_expr(orders::Column::AssignedAt, Expr::value(Some(now)))
        .col_expr(orders::Column::UpdatedAt, Expr::value(now))
        .filter(orders::Column::Id.eq(order.id));
    update = match order.agent_id {
        Some(expected) => update.filter(orders::Column::AgentId.eq(expected)),
        None => update.filter(orders::Column::AgentId.is_null()),
    };
    let result = update.exec(conn).await?;
    if result.rows_affected != 1 {
        return Err(AppError::Conflict(format!(
            "order {} was reassigned concurrently",
            order.order_code
        )));
    }

    let existing = OrderAssignments::find()
        .filter(order_assignments::Column::OrderId.eq(order.id))
        .lock(LockType::Update)
        .one(conn)
        .await?;
    let assignment = match existing {
        Some(existing) => {
            let previous = existing.agent_id;
            let mut active: order_assignments::ActiveModel = existing.into();
            if previous != write.agent_id {
                active.previous_agent_id = Set(Some(previous));
            }
            active.agent_id = Set(write.agent_id);
            active.manager_id = Set(write.manager_id);
            active.priority = Set(write.priority.as_str().to_string());
            active.assignment_reason = Set(write.reason.clone());
            active.manager_notes = Set(write.manager_notes.clone());
            active.assignment_date = Set(now);
            active.updated_at = Set(now);
            active.update(conn).await?
        }
        None => {
            order_assignments::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                agent_id: Set(write.agent_id),
                manager_id: Set(write.manager_id),
                previous_agent_id: Set(order.agent_id),
                priority: Set(write.priority.as_str().to_string()),
                assignment_reason: Set(write.reason.clone()),
                manager_notes: Set(write.manager_notes.clone()),
                assignment_date: Set(now),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?
        }
    };
    Ok(assignment)
}

/// Give an unassigned order to the least loaded agent. An order that already
/// has an agent is left alone and `None` comes back.
pub async fn auto_assign<C: ConnectionTrait>(
    conn: &C,
    calendar: &BusinessCalendar,
    order_id: Uuid,
    manager_id: Option<Uuid>,
) -> AppResult<Option<AssignmentModel>> {
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;
    if order.agent_id.is_some() {
        return Ok(None);
    }

    let pool = agent_pool(conn, false).await?;
    let agent_id = dispatch::lowest_workload(&loads(conn, calendar, &pool).await?)?;
    let manager_id = match manager_id {
        Some(id) => Some(id),
        None => default_manager(conn).await?,
    };
    let assignment = write_assignment(
        conn,
        &order,
        &AssignmentWrite {
            agent_id,
            manager_id,
            priority: AssignmentPriority::Medium,
            reason: dispatch::REASON_AUTO_ASSIGN.to_string(),
            manager_notes: String::new(),
        },
    )
    .await?;
    audit::append(
        conn,
        AuditEntry::new(actions::ORDER_ASSIGNED, "order", order.id)
            .describe(format!("Auto-assigned {} to agent {agent_id}", order.order_code))
            .with_metadata(json!({ "agent_id": agent_id, "reason": dispatch::REASON_AUTO_ASSIGN })),
    )
    .await?;
    tracing::info!(order_id = %order.id, %agent_id, "order auto-assigned");
    Ok(Some(assignment))
}

/// Manager assignment. Creates the assignment row when the order has none,
/// otherwise moves the current agent into `previous_agent_id`.
pub async fn reassign(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    payload: AssignAgentRequest,
) -> AppResult<ApiResponse<OrderAssignment>> {
    access::can_reassign(actor)?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("order", order_id))?;

    let agent = Users::find_by_id(payload.agent_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("user", payload.agent_id))?;
    if !agent.is_active || !role_service::has_role(&txn, agent.id, roles::CALL_CENTER_AGENT).await? {
        return Err(AppError::validation(
            "agent_id",
            "must be an active call center agent",
        ));
    }

    let previous = order.agent_id;
    let reason = payload
        .reason
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Manual assignment".to_string());
    let assignment = write_assignment(
        &txn,
        &order,
        &AssignmentWrite {
            agent_id: agent.id,
            manager_id: Some(actor.user_id),
            priority: payload.priority,
            reason: reason.clone(),
            manager_notes: payload.manager_notes.clone().unwrap_or_default(),
        },
    )
    .await?;

    let action = if previous.is_some() {
        actions::ORDER_REASSIGNED
    } else {
        actions::ORDER_ASSIGNED
    };
    audit::append(
        &txn,
        AuditEntry::new(action, "order", order.id)
            .by(actor)
            .describe(format!("Assigned {} to {}", order.order_code, agent.email))
            .with_metadata(json!({
                "agent_id": agent.id,
                "previous_agent_id": previous,
                "reason": reason,
            })),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, order_id = %order.id, agent_id = %agent.id, "order assigned");
    let (kind, title) = if previous.is_some() {
        (NotificationKind::OrderReassigned, "Order reassigned to you")
    } else {
        (NotificationKind::OrderAssigned, "New order assigned")
    };
    let notice = Notice::order(
        kind,
        order.id,
        title,
        format!("Order {} has been assigned to you.", order.order_code),
    )
    .for_role(roles::CALL_CENTER_AGENT);
    notification_service::notify_agent(state, &notice, agent.id);
    if let Some(previous) = previous.filter(|p| *p != agent.id) {
        let notice = Notice::order(
            NotificationKind::OrderReassigned,
            order.id,
            "Order reassigned",
            format!("Order {} was moved to another agent.", order.order_code),
        );
        notification_service::notify_agent(state, &notice, previous);
    }

    Ok(ApiResponse::success(
        "Agent assigned",
        assignment_from_entity(assignment),
        Some(Meta::empty()),
    ))
}

/// Distribute every unassigned order. An empty pool fails before any order
/// is touched.
pub async fn distribute(
    state: &AppState,
    actor: &Actor,
    policy: DistributionPolicy,
) -> AppResult<ApiResponse<DistributionResult>> {
    access::can_distribute(actor)?;

    let txn = state.orm.begin().await?;
    let pool = agent_pool(&txn, false).await?;
    if pool.is_empty() {
        return Err(AppError::NoAgentsAvailable);
    }

    let pending = Orders::find()
        .filter(orders::Column::AgentId.is_null())
        .filter(orders::Column::Status.is_in(UNASSIGNED_STATUSES))
        .order_by_asc(orders::Column::CreatedAt)
        .order_by_asc(orders::Column::OrderCode)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let picks: Vec<(Uuid, &'static str)> = match policy {
        DistributionPolicy::Equal => {
            dispatch::equal_distribution(&loads(&txn, &state.calendar, &pool).await?, pending.len())?
                .into_iter()
                .map(|agent| (agent, dispatch::REASON_EQUAL))
                .collect()
        }
        DistributionPolicy::Performance => dispatch::performance_weighted(
            &performance(&txn, &state.calendar, &pool).await?,
            pending.len(),
        )?
        .into_iter()
        .map(|pick| (pick.agent_id, pick.reason()))
        .collect(),
    };

    let mut assignments = Vec::with_capacity(pending.len());
    for (order, (agent_id, reason)) in pending.iter().zip(picks) {
        write_assignment(
            &txn,
            order,
            &AssignmentWrite {
                agent_id,
                manager_id: Some(actor.user_id),
                priority: AssignmentPriority::Medium,
                reason: reason.to_string(),
                manager_notes: String::new(),
            },
        )
        .await?;
        audit::append(
            &txn,
            AuditEntry::new(actions::ORDER_ASSIGNED, "order", order.id)
                .by(actor)
                .describe(format!("Distributed {} to agent {agent_id}", order.order_code))
                .with_metadata(json!({ "agent_id": agent_id, "reason": reason })),
        )
        .await?;
        assignments.push(AssignmentSummary {
            order_id: order.id,
            order_code: order.order_code.clone(),
            agent_id,
            reason: reason.to_string(),
        });
    }
    txn.commit().await?;

    tracing::info!(
        actor_id = %actor.user_id,
        ?policy,
        distributed = assignments.len(),
        agents = pool.len(),
        "orders distributed"
    );
    for summary in &assignments {
        let notice = Notice::order(
            NotificationKind::OrderAssigned,
            summary.order_id,
            "New order assigned",
            format!("Order {} has been assigned to you.", summary.order_code),
        )
        .for_role(roles::CALL_CENTER_AGENT);
        notification_service::notify_agent(state, &notice, summary.agent_id);
    }

    Ok(ApiResponse::success(
        "Orders distributed",
        DistributionResult {
            policy,
            distributed_count: assignments.len(),
            assignments,
        },
        Some(Meta::empty()),
    ))
}

/// Even out today's still-open assignments until no two agents differ by
/// more than one.
pub async fn balance(state: &AppState, actor: &Actor) -> AppResult<ApiResponse<BalanceResult>> {
    access::can_distribute(actor)?;

    let txn = state.orm.begin().await?;
    let pool = agent_pool(&txn, false).await?;
    if pool.is_empty() {
        return Err(AppError::NoAgentsAvailable);
    }
    let today = state.calendar.today_range(Utc::now());
    let mut finder = OrderAssignments::find()
        .find_also_related(Orders)
        .filter(order_assignments::Column::AgentId.is_in(pool.iter().map(|a| a.agent_id)))
        .filter(order_assignments::Column::AssignmentDate.gte(today.start.fixed_offset()))
        .filter(orders::Column::Status.is_in(UNASSIGNED_STATUSES));
    if let Some(end) = today.end {
        finder = finder.filter(order_assignments::Column::AssignmentDate.lt(end.fixed_offset()));
    }
    let rows = finder
        .order_by_asc(order_assignments::Column::AssignmentDate)
        .all(&txn)
        .await?;

    let mut held: Vec<AgentAssignments> = pool
        .iter()
        .map(|agent| AgentAssignments {
            agent_id: agent.agent_id,
            assignment_ids: Vec::new(),
        })
        .collect();
    let mut by_assignment: HashMap<Uuid, AssignmentModel> = HashMap::new();
    for (assignment, order) in rows {
        if order.is_none() {
            continue;
        }
        if let Some(slot) = held.iter_mut().find(|h| h.agent_id == assignment.agent_id) {
            slot.assignment_ids.push(assignment.id);
            by_assignment.insert(assignment.id, assignment);
        }
    }

    let plan = dispatch::plan_balance(&held);
    let mut moves = Vec::with_capacity(plan.len());
    for step in plan {
        let Some(assignment) = by_assignment.get(&step.assignment_id) else {
            continue;
        };
        let order = Orders::find_by_id(assignment.order_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("order", assignment.order_id))?;
        write_assignment(
            &txn,
            &order,
            &AssignmentWrite {
                agent_id: step.to_agent,
                manager_id: Some(actor.user_id),
                priority: AssignmentPriority::Medium,
                reason: dispatch::REASON_BALANCE.to_string(),
                manager_notes: String::new(),
            },
        )
        .await?;
        audit::append(
            &txn,
            AuditEntry::new(actions::ORDERS_BALANCED, "order", order.id)
                .by(actor)
                .describe(format!("Moved {} for workload balancing", order.order_code))
                .with_metadata(json!({ "from_agent": step.from_agent, "to_agent": step.to_agent })),
        )
        .await?;
        moves.push(BalancedOrder {
            order_id: order.id,
            from_agent: step.from_agent,
            to_agent: step.to_agent,
        });
    }
    txn.commit().await?;

    tracing::info!(actor_id = %actor.user_id, moved = moves.len(), "workload balanced");
    for moved in &moves {
        let notice = Notice::order(
            NotificationKind::OrderReassigned,
            moved.order_id,
            "Order reassigned to you",
            "An order was moved to you for workload balancing.",
        );
        notification_service::notify_agent(state, &notice, moved.to_agent);
    }

    Ok(ApiResponse::success(
        "Workload balanced",
        BalanceResult {
            moved_count: moves.len(),
            moves,
        },
        Some(Meta::empty()),
    ))
}

pub async fn workload_summary(state: &AppState, actor: &Actor) -> AppResult<ApiResponse<WorkloadSummary>> {
    access::can_view_workload(actor)?;

    let pool = agent_pool(&state.orm, true).await?;
    let now = Utc::now();
    let today = state.calendar.today_range(now);
    let counts = assignment_counts(&state.orm, today.start, today.end, &ACTIVE_STATUSES).await?;
    let scores: HashMap<Uuid, f64> = performance(&state.orm, &state.calendar, &pool)
        .await?
        .into_iter()
        .map(|p| (p.agent_id, p.score()))
        .collect();
    let unassigned_orders = Orders::find()
        .filter(orders::Column::AgentId.is_null())
        .filter(orders::Column::Status.is_in(UNASSIGNED_STATUSES))
        .count(&state.orm)
        .await?;

    let agents = pool
        .into_iter()
        .map(|agent| {
            let (assigned_today, active_today) = counts.get(&agent.agent_id).copied().unwrap_or((0, 0));
            AgentWorkload {
                performance_score: scores.get(&agent.agent_id).copied().unwrap_or(0.0),
                agent_id: agent.agent_id,
                email: agent.email,
                full_name: agent.full_name,
                availability: agent.availability.unwrap_or_else(|| "available".to_string()),
                assigned_today,
                active_today,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Agent workload",
        WorkloadSummary {
            business_date: state.calendar.today(now),
            unassigned_orders,
            agents,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn assignment_from_entity(model: AssignmentModel) -> OrderAssignment {
    OrderAssignment {
        id: model.id,
        order_id: model.order_id,
        agent_id: model.agent_id,
        manager_id: model.manager_id,
        previous_agent_id: model.previous_agent_id,
        priority: model.priority,
        assignment_reason: model.assignment_reason,
        manager_notes: model.manager_notes,
        assignment_date: model.assignment_date.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

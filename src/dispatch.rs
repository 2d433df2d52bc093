//! Agent selection policies. Everything here is pure: the assignment service
//! loads the agent pool and workloads, asks a policy for decisions, then writes
//! them.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const REASON_AUTOMATIC: &str = "Automatic distribution";
pub const REASON_FALLBACK: &str = "Automatic distribution - fallback";
pub const REASON_EQUAL: &str = "Bulk distribution";
pub const REASON_AUTO_ASSIGN: &str = "Auto-assigned on creation";
pub const REASON_BALANCE: &str = "Workload balancing";

/// Fixed until completion data is tracked per agent.
pub const COMPLETION_FACTOR: f64 = 1.0;
const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// An agent and the number of orders assigned to them today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLoad {
    pub agent_id: Uuid,
    pub workload: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPerformance {
    pub agent_id: Uuid,
    /// Today's assignments still in pending, processing or confirmed.
    pub active_workload: u32,
    /// Assignments over the trailing window.
    pub recent_total: u32,
    pub recent_confirmed: u32,
}

impl AgentPerformance {
    pub fn success_rate(&self) -> f64 {
        if self.recent_total == 0 {
            DEFAULT_SUCCESS_RATE
        } else {
            f64::from(self.recent_confirmed) / f64::from(self.recent_total)
        }
    }

    pub fn score(&self) -> f64 {
        performance_score(self.success_rate(), COMPLETION_FACTOR)
    }
}

pub fn performance_score(success_rate: f64, completion_factor: f64) -> f64 {
    (0.7 * success_rate + 0.3 * completion_factor).clamp(0.1, 2.0)
}

/// One policy decision: which agent gets the order at the same batch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    pub agent_id: Uuid,
    pub fallback: bool,
}

impl Pick {
    pub fn reason(&self) -> &'static str {
        if self.fallback {
            REASON_FALLBACK
        } else {
            REASON_AUTOMATIC
        }
    }
}

/// Round-robin over agents sorted by ascending workload. The sort is stable,
/// so agents with equal load keep pool order.
pub fn equal_distribution(agents: &[AgentLoad], order_count: usize) -> AppResult<Vec<Uuid>> {
    if agents.is_empty() {
        return Err(AppError::NoAgentsAvailable);
    }
    let mut sorted = agents.to_vec();
    sorted.sort_by_key(|a| a.workload);
    Ok((0..order_count)
        .map(|i| sorted[i % sorted.len()].agent_id)
        .collect())
}

/// The least loaded agent; the first one in pool order wins ties.
pub fn lowest_workload(agents: &[AgentLoad]) -> AppResult<Uuid> {
    agents
        .iter()
        .min_by_key(|a| a.workload)
        .map(|a| a.agent_id)
        .ok_or(AppError::NoAgentsAvailable)
}

/// Capacity-weighted distribution of `order_count` orders.
pub fn performance_weighted(
    agents: &[AgentPerformance],
    order_count: usize,
) -> AppResult<Vec<Pick>> {
    if agents.is_empty() {
        return Err(AppError::NoAgentsAvailable);
    }
    let orders_per_agent = order_count.div_ceil(agents.len()) as u32;

    let mut ranked: Vec<(Uuid, u32)> = agents
        .iter()
        .map(|a| {
            let room = orders_per_agent.saturating_sub(a.active_workload);
            (a.agent_id, (f64::from(room) * a.score()).floor() as u32)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut assigned = vec![0u32; ranked.len()];
    let mut cursor = 0usize;
    let mut picks = Vec::with_capacity(order_count);

    for _ in 0..order_count {
        let mut chosen = None;
        for step in 0..ranked.len() {
            let idx = (cursor + step) % ranked.len();
            if assigned[idx] < ranked[idx].1 {
                chosen = Some(idx);
                cursor = (idx + 1) % ranked.len();
                break;
            }
        }
        match chosen {
            Some(idx) => {
                assigned[idx] += 1;
                picks.push(Pick {
                    agent_id: ranked[idx].0,
                    fallback: false,
                });
            }
            None => {
                assigned[0] += 1;
                picks.push(Pick {
                    agent_id: ranked[0].0,
                    fallback: true,
                });
            }
        }
    }
    Ok(picks)
}

/// Today's assignments held by one agent, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAssignments {
    pub agent_id: Uuid,
    pub assignment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceMove {
    pub assignment_id: Uuid,
    pub from_agent: Uuid,
    pub to_agent: Uuid,
}

/// Moves that shrink the gap between the busiest and idlest agent to at most
/// one. The most recent assignment of the busiest agent moves first.
pub fn plan_balance(loads: &[AgentAssignments]) -> Vec<BalanceMove> {
    let mut loads = loads.to_vec();
    let mut moves = Vec::new();
    if loads.len() < 2 {
        return moves;
    }

    loop {
        let (max_idx, min_idx) = extremes(&loads);
        let gap = loads[max_idx].assignment_ids.len() - loads[min_idx].assignment_ids.len();
        if gap <= 1 {
            break;
        }
        let Some(assignment_id) = loads[max_idx].assignment_ids.pop() else {
            break;
        };
        loads[min_idx].assignment_ids.push(assignment_id);
        moves.push(BalanceMove {
            assignment_id,
            from_agent: loads[max_idx].agent_id,
            to_agent: loads[min_idx].agent_id,
        });
    }
    moves
}

fn extremes(loads: &[AgentAssignments]) -> (usize, usize) {
    let mut max_idx = 0;
    let mut min_idx = 0;
    for (idx, load) in loads.iter().enumerate() {
        if load.assignment_ids.len() > loads[max_idx].assignment_ids.len() {
            max_idx = idx;
        }
        if load.assignment_ids.len() < loads[min_idx].assignment_ids.len() {
            min_idx = idx;
        }
    }
    (max_idx, min_idx)
}

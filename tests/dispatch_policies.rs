use fulfillment_engine::{
    dispatch::{
        AgentAssignments, AgentLoad, AgentPerformance, REASON_AUTOMATIC, REASON_FALLBACK,
        equal_distribution, lowest_workload, performance_score, performance_weighted, plan_balance,
    },
    error::AppError,
};
use uuid::Uuid;

fn agents(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

#[test]
fn equal_distribution_starts_with_the_least_loaded() {
    let ids = agents(3);
    let loads = [
        AgentLoad { agent_id: ids[0], workload: 2 },
        AgentLoad { agent_id: ids[1], workload: 0 },
        AgentLoad { agent_id: ids[2], workload: 1 },
    ];

    let picks = equal_distribution(&loads, 5).unwrap();
    assert_eq!(picks, vec![ids[1], ids[2], ids[0], ids[1], ids[2]]);
}

#[test]
fn empty_pool_is_an_error_for_every_policy() {
    assert!(matches!(equal_distribution(&[], 3), Err(AppError::NoAgentsAvailable)));
    assert!(matches!(lowest_workload(&[]), Err(AppError::NoAgentsAvailable)));
    assert!(matches!(performance_weighted(&[], 3), Err(AppError::NoAgentsAvailable)));
}

#[test]
fn lowest_workload_breaks_ties_by_pool_order() {
    let ids = agents(3);
    let loads = [
        AgentLoad { agent_id: ids[0], workload: 4 },
        AgentLoad { agent_id: ids[1], workload: 1 },
        AgentLoad { agent_id: ids[2], workload: 1 },
    ];
    assert_eq!(lowest_workload(&loads).unwrap(), ids[1]);
}

#[test]
fn performance_score_is_clamped() {
    assert_eq!(performance_score(0.0, 0.0), 0.1);
    assert_eq!(performance_score(3.0, 3.0), 2.0);
    assert!((performance_score(1.0, 1.0) - 1.0).abs() < f64::EPSILON);
}

#[test]
fn agents_without_history_get_the_default_rate() {
    let fresh = AgentPerformance {
        agent_id: Uuid::new_v4(),
        active_workload: 0,
        recent_total: 0,
        recent_confirmed: 0,
    };
    assert_eq!(fresh.success_rate(), 0.5);
    assert!((fresh.score() - 0.65).abs() < 1e-9);
}

#[test]
fn performance_policy_fills_capacity_then_falls_back() {
    let ids = agents(2);
    let pool = [
        AgentPerformance {
            agent_id: ids[0],
            active_workload: 0,
            recent_total: 10,
            recent_confirmed: 10,
        },
        AgentPerformance {
            agent_id: ids[1],
            active_workload: 0,
            recent_total: 0,
            recent_confirmed: 0,
        },
    ];

    // Two orders per agent: the strong agent has room for 2, the fresh one for 1.
    let picks = performance_weighted(&pool, 4).unwrap();
    let chosen: Vec<Uuid> = picks.iter().map(|p| p.agent_id).collect();
    assert_eq!(chosen, vec![ids[0], ids[1], ids[0], ids[0]]);
    assert_eq!(picks[0].reason(), REASON_AUTOMATIC);
    assert!(picks[3].fallback);
    assert_eq!(picks[3].reason(), REASON_FALLBACK);
}

#[test]
fn busy_agents_get_no_capacity() {
    let ids = agents(2);
    let pool = [
        AgentPerformance {
            agent_id: ids[0],
            active_workload: 5,
            recent_total: 4,
            recent_confirmed: 4,
        },
        AgentPerformance {
            agent_id: ids[1],
            active_workload: 0,
            recent_total: 4,
            recent_confirmed: 4,
        },
    ];
    let picks = performance_weighted(&pool, 2).unwrap();
    assert!(picks.iter().take(1).all(|p| p.agent_id == ids[1] && !p.fallback));
}

#[test]
fn balancing_moves_newest_assignments_until_the_gap_is_one() {
    let ids = agents(2);
    let held = agents(4);
    let loads = [
        AgentAssignments {
            agent_id: ids[0],
            assignment_ids: held.clone(),
        },
        AgentAssignments {
            agent_id: ids[1],
            assignment_ids: Vec::new(),
        },
    ];

    let moves = plan_balance(&loads);
    assert_eq!(moves.len(), 2);
    assert_eq!(moves[0].assignment_id, held[3]);
    assert_eq!(moves[1].assignment_id, held[2]);
    assert!(moves.iter().all(|m| m.from_agent == ids[0] && m.to_agent == ids[1]));
}

#[test]
fn balanced_or_single_agent_pools_need_no_moves() {
    let ids = agents(2);
    let single = [AgentAssignments {
        agent_id: ids[0],
        assignment_ids: agents(6),
    }];
    assert!(plan_balance(&single).is_empty());

    let even = [
        AgentAssignments {
            agent_id: ids[0],
            assignment_ids: agents(3),
        },
        AgentAssignments {
            agent_id: ids[1],
            assignment_ids: agents(2),
        },
    ];
    assert!(plan_balance(&even).is_empty());
}

// Fallback heuristic: greedy fill per position, then budget-aware swaps.
//
// Phase 1 walks positions in lineup order (GK, DEF, MID, FWD) sharing one
// running cost. Each position takes candidates by value ratio until the
// next one is unaffordable; any slots still open are retried from the
// unpicked remainder cheapest-first. A position that cannot be filled means
// no lineup for this formation.
//
// Phase 2 repeats the single best same-position upgrade (strictly higher
// score, still within budget) while total cost is below
// `improvement_threshold * budget`.
//
// Both phases use stable sorts over pool order, so identical inputs give
// identical lineups.

use crate::formation::Formation;
use crate::lineup::{LineupError, OptimizationResult, SolveMethod};
use crate::params::OptimizerParams;
use crate::player::{PlayerCandidate, Position};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FallbackFailure {
    /// Some position cannot be filled within the budget.
    #[error("no affordable lineup fills every position")]
    Unfillable,

    /// Quotas and budget hold by construction; this catches pools that
    /// break the heuristic's assumptions, such as repeated player ids.
    #[error("heuristic lineup is invalid: {0}")]
    InvalidLineup(#[from] LineupError),
}

impl FallbackFailure {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, FallbackFailure::InvalidLineup(_))
    }
}

/// Build a lineup for `formation` without a solver backend.
pub fn solve(
    pool: &[PlayerCandidate],
    formation: &Formation,
    budget: u32,
    params: &OptimizerParams,
) -> Result<OptimizationResult, FallbackFailure> {
    let mut selected = greedy_fill(pool, formation, budget).ok_or(FallbackFailure::Unfillable)?;
    improve(pool, &mut selected, budget, params.improvement_threshold);

    let lineup: Vec<PlayerCandidate> = selected.iter().map(|&i| pool[i].clone()).collect();
    Ok(OptimizationResult::build(
        formation,
        lineup,
        budget,
        SolveMethod::Fallback,
    )?)
}

// ---------------------------------------------------------------------------
// Phase 1
// ---------------------------------------------------------------------------

/// Returns pool indices of the picked players, grouped by position.
fn greedy_fill(pool: &[PlayerCandidate], formation: &Formation, budget: u32) -> Option<Vec<usize>> {
    let budget = budget as u64;
    let mut total_cost: u64 = 0;
    let mut selected = Vec::with_capacity(formation.squad_size());

    for position in Position::ALL {
        let required = formation.quota(position);
        if required == 0 {
            continue;
        }

        let mut group: Vec<usize> = (0..pool.len())
            .filter(|&i| pool[i].position == position)
            .collect();
        group.sort_by(|&a, &b| pool[b].value_ratio().total_cmp(&pool[a].value_ratio()));

        let mut picked: Vec<usize> = Vec::with_capacity(required);
        for &i in &group {
            if picked.len() == required {
                break;
            }
            let cost = pool[i].cost as u64;
            if total_cost + cost > budget {
                break;
            }
            total_cost += cost;
            picked.push(i);
        }

        if picked.len() < required {
            let mut remainder: Vec<usize> = group
                .iter()
                .copied()
                .filter(|i| !picked.contains(i))
                .collect();
            remainder.sort_by_key(|&i| pool[i].cost);

            for &i in &remainder {
                if picked.len() == required {
                    break;
                }
                let cost = pool[i].cost as u64;
                if total_cost + cost <= budget {
                    total_cost += cost;
                    picked.push(i);
                }
            }
        }

        if picked.len() < required {
            return None;
        }
        selected.extend(picked);
    }

    Some(selected)
}

// ---------------------------------------------------------------------------
// Phase 2
// ---------------------------------------------------------------------------

/// Swap in higher-scoring same-position players while budget use is below
/// the threshold. One swap per round, always the one giving the highest
/// resulting total score.
fn improve(pool: &[PlayerCandidate], selected: &mut [usize], budget: u32, threshold: f64) {
    let budget_u64 = budget as u64;
    let stop_at = threshold * budget as f64;

    loop {
        let total_cost: u64 = selected.iter().map(|&i| pool[i].cost as u64).sum();
        if total_cost as f64 >= stop_at {
            break;
        }
        let total_score: f64 = selected.iter().map(|&i| pool[i].predicted_score).sum();

        // (slot in `selected`, replacement pool index, resulting score)
        let mut best: Option<(usize, usize, f64)> = None;
        for (slot, &current) in selected.iter().enumerate() {
            let out = &pool[current];
            for (candidate, incoming) in pool.iter().enumerate() {
                if incoming.position != out.position
                    || incoming.predicted_score <= out.predicted_score
                    || selected.contains(&candidate)
                {
                    continue;
                }
                let new_cost = total_cost - out.cost as u64 + incoming.cost as u64;
                if new_cost > budget_u64 {
                    continue;
                }
                let new_score = total_score - out.predicted_score + incoming.predicted_score;
                if best.map_or(true, |(_, _, score)| new_score > score) {
                    best = Some((slot, candidate, new_score));
                }
            }
        }

        match best {
            Some((slot, candidate, _)) => selected[slot] = candidate,
            None => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

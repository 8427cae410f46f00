// Exact solver: one formation, one budget, solved as a binary integer program.
//
// Formulation:
//   x[i] in {0, 1} for every candidate in the (already filtered) pool
//   sum x[i]                          = squad size (11)
//   sum x[i] over each position       = formation quota (GK = 1)
//   sum cost[i] * x[i]                <= budget
//   maximize sum (w_s * score[i] / score_scale + w_c * cost[i] / cost_scale) * x[i]
//
// The blended objective only steers the backend. The reported objective is
// always the plain sum of the selected players' predicted scores.

use crate::backend::{
    BackendError, BinaryProgram, BinaryProgramBackend, LinearConstraint, Relation, SolveStatus,
};
use crate::formation::Formation;
use crate::lineup::{LineupError, OptimizationResult, SolveMethod};
use crate::params::OptimizerParams;
use crate::player::{position_counts, PlayerCandidate, Position};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;

/// Decision variables above this value count as selected.
pub const SELECTION_THRESHOLD: f64 = 0.5;

// ---------------------------------------------------------------------------
// Failure type
// ---------------------------------------------------------------------------

/// Every way the exact path can fail. None of these reach the caller of a
/// sweep; each one routes the formation to the fallback heuristic.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExactFailure {
    #[error("candidate pool is empty")]
    EmptyPool,

    #[error("{available} candidates at {position}, formation needs {required}")]
    InsufficientCandidates {
        position: Position,
        required: usize,
        available: usize,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("solver backend panicked: {0}")]
    Panicked(String),

    #[error("solver returned status {0}")]
    Status(SolveStatus),

    #[error("solver reported {0} but returned no assignment")]
    MissingSolution(SolveStatus),

    #[error("solver returned {got} values for {expected} variables")]
    MalformedSolution { expected: usize, got: usize },

    #[error("solver returned a non-finite value for variable {0}")]
    NonFiniteValue(usize),

    #[error("solver selected {selected} players, expected {expected}")]
    WrongSelectionCount { expected: usize, selected: usize },

    #[error("solver lineup is invalid: {0}")]
    InvalidLineup(#[from] LineupError),

    #[error("solver did not finish within {0:?}")]
    TimedOut(Duration),
}

impl ExactFailure {
    /// Failures that point at a numerical or backend anomaly rather than a
    /// genuinely infeasible problem.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            ExactFailure::MissingSolution(_)
                | ExactFailure::MalformedSolution { .. }
                | ExactFailure::NonFiniteValue(_)
                | ExactFailure::WrongSelectionCount { .. }
                | ExactFailure::InvalidLineup(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Formulation
// ---------------------------------------------------------------------------

/// Divisor for score shares. The pool maximum when positive; otherwise the
/// largest magnitude so an all-negative pool keeps its ordering.
fn score_scale(pool: &[PlayerCandidate]) -> f64 {
    let max = pool
        .iter()
        .map(|p| p.predicted_score)
        .fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        return max;
    }
    let magnitude = pool
        .iter()
        .map(|p| p.predicted_score.abs())
        .fold(0.0, f64::max);
    if magnitude > 0.0 {
        magnitude
    } else {
        1.0
    }
}

fn cost_scale(pool: &[PlayerCandidate]) -> f64 {
    match pool.iter().map(|p| p.cost).max() {
        Some(max) if max > 0 => max as f64,
        _ => 1.0,
    }
}

/// Build the binary program for `formation` over `pool`.
///
/// Position constraints with no candidates are omitted; callers check
/// quotas against the pool first (see [`ExactSolver::solve`]).
pub fn formulate(
    pool: &[PlayerCandidate],
    formation: &Formation,
    budget: u32,
    params: &OptimizerParams,
) -> BinaryProgram {
    let score_scale = score_scale(pool);
    let cost_scale = cost_scale(pool);

    let objective = pool
        .iter()
        .map(|p| {
            params.score_weight * (p.predicted_score / score_scale)
                + params.cost_weight * (p.cost as f64 / cost_scale)
        })
        .collect();

    let mut constraints = Vec::with_capacity(Position::ALL.len() + 2);
    constraints.push(LinearConstraint {
        name: "squad_size".into(),
        terms: (0..pool.len()).map(|i| (i, 1.0)).collect(),
        relation: Relation::Equal,
        rhs: formation.squad_size() as f64,
    });

    for position in Position::ALL {
        let terms: Vec<(usize, f64)> = pool
            .iter()
            .enumerate()
            .filter(|(_, p)| p.position == position)
            .map(|(i, _)| (i, 1.0))
            .collect();
        if terms.is_empty() {
            continue;
        }
        constraints.push(LinearConstraint {
            name: format!("quota_{}", position.display_str().to_lowercase()),
            terms,
            relation: Relation::Equal,
            rhs: formation.quota(position) as f64,
        });
    }

    constraints.push(LinearConstraint {
        name: "budget".into(),
        terms: pool
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.cost as f64))
            .collect(),
        relation: Relation::LessOrEqual,
        rhs: budget as f64,
    });

    BinaryProgram {
        objective,
        constraints,
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExactSolver<B> {
    backend: B,
    params: OptimizerParams,
}

impl<B: BinaryProgramBackend> ExactSolver<B> {
    pub fn new(backend: B, params: OptimizerParams) -> Self {
        ExactSolver { backend, params }
    }

    /// Solve one formation. `pool` must already be eligibility- and
    /// budget-filtered.
    pub fn solve(
        &self,
        pool: &[PlayerCandidate],
        formation: &Formation,
        budget: u32,
    ) -> Result<OptimizationResult, ExactFailure> {
        if pool.is_empty() {
            return Err(ExactFailure::EmptyPool);
        }

        let counts = position_counts(pool);
        for position in Position::ALL {
            let required = formation.quota(position);
            let available = counts[position.sort_order() as usize];
            if available < required {
                return Err(ExactFailure::InsufficientCandidates {
                    position,
                    required,
                    available,
                });
            }
        }

        let program = formulate(pool, formation, budget, &self.params);
        let solution = panic::catch_unwind(AssertUnwindSafe(|| self.backend.solve(&program)))
            .map_err(|payload| ExactFailure::Panicked(panic_message(payload.as_ref())))??;

        if !solution.status.is_usable() {
            return Err(ExactFailure::Status(solution.status));
        }
        let values = solution
            .values
            .ok_or(ExactFailure::MissingSolution(solution.status))?;

        let lineup = reconstruct(pool, &values, formation.squad_size())?;
        Ok(OptimizationResult::build(
            formation,
            lineup,
            budget,
            SolveMethod::Exact,
        )?)
    }
}

/// Read the decision variables back into a lineup ordered by position,
/// then by pool order.
fn reconstruct(
    pool: &[PlayerCandidate],
    values: &[f64],
    expected: usize,
) -> Result<Vec<PlayerCandidate>, ExactFailure> {
    if values.len() != pool.len() {
        return Err(ExactFailure::MalformedSolution {
            expected: pool.len(),
            got: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ExactFailure::NonFiniteValue(index));
    }

    let mut lineup: Vec<PlayerCandidate> = pool
        .iter()
        .zip(values)
        .filter(|(_, &v)| v > SELECTION_THRESHOLD)
        .map(|(p, _)| p.clone())
        .collect();

    if lineup.len() != expected {
        return Err(ExactFailure::WrongSelectionCount {
            expected,
            selected: lineup.len(),
        });
    }

    lineup.sort_by_key(|p| p.position.sort_order());
    Ok(lineup)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Optimization results and the lineup validity rules.
//
// An OptimizationResult can only be built through `OptimizationResult::build`,
// which checks the formation quotas and the budget, so every result handed
// to a caller is a complete, affordable lineup.

use crate::formation::Formation;
use crate::player::{PlayerCandidate, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineupError {
    #[error("lineup has {actual} players, formation {formation} needs {expected}")]
    WrongSize {
        formation: String,
        expected: usize,
        actual: usize,
    },

    #[error("lineup has {actual} at {position}, formation {formation} needs {expected}")]
    PositionQuota {
        formation: String,
        position: Position,
        expected: usize,
        actual: usize,
    },

    #[error("lineup costs {cost}, budget is {budget}")]
    OverBudget { cost: u64, budget: u32 },

    #[error("player `{0}` appears more than once")]
    DuplicatePlayer(String),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Which solver produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    Exact,
    Fallback,
}

impl fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveMethod::Exact => write!(f, "exact"),
            SolveMethod::Fallback => write!(f, "fallback"),
        }
    }
}

/// A feasible lineup for one formation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub formation: String,
    pub lineup: Vec<PlayerCandidate>,
    /// Sum of the lineup's predicted scores.
    pub objective: f64,
    pub total_cost: u32,
    pub remaining_budget: u32,
    pub method: SolveMethod,
}

/// The per-formation row shown when listing alternatives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormationSummary {
    pub formation: String,
    pub objective: f64,
    pub remaining_budget: u32,
    pub method: SolveMethod,
}

impl OptimizationResult {
    /// Validate `lineup` against `formation` and `budget` and compute the
    /// objective and remaining budget from the selected players.
    pub fn build(
        formation: &Formation,
        lineup: Vec<PlayerCandidate>,
        budget: u32,
        method: SolveMethod,
    ) -> Result<Self, LineupError> {
        let cost = validate_lineup(formation, &lineup, budget)?;
        // validate_lineup guarantees cost <= budget, so it fits in u32.
        let total_cost = cost as u32;
        let objective = lineup.iter().map(|p| p.predicted_score).sum();

        Ok(OptimizationResult {
            formation: formation.tag.clone(),
            lineup,
            objective,
            total_cost,
            remaining_budget: budget - total_cost,
            method,
        })
    }

    pub fn summary(&self) -> FormationSummary {
        FormationSummary {
            formation: self.formation.clone(),
            objective: self.objective,
            remaining_budget: self.remaining_budget,
            method: self.method,
        }
    }

    /// Players at a given position, in lineup order.
    pub fn players_at(&self, position: Position) -> impl Iterator<Item = &PlayerCandidate> {
        self.lineup.iter().filter(move |p| p.position == position)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check the validity rules for a lineup. Returns the total cost on success.
///
/// 1. Size equals the formation's squad size (11 for full formations).
/// 2. Exactly one goalkeeper and the exact DEF/MID/FWD quotas.
/// 3. No player selected twice.
/// 4. Total cost within budget.
pub fn validate_lineup(
    formation: &Formation,
    lineup: &[PlayerCandidate],
    budget: u32,
) -> Result<u64, LineupError> {
    let expected = formation.squad_size();
    if lineup.len() != expected {
        return Err(LineupError::WrongSize {
            formation: formation.tag.clone(),
            expected,
            actual: lineup.len(),
        });
    }

    for position in Position::ALL {
        let actual = lineup.iter().filter(|p| p.position == position).count();
        let expected = formation.quota(position);
        if actual != expected {
            return Err(LineupError::PositionQuota {
                formation: formation.tag.clone(),
                position,
                expected,
                actual,
            });
        }
    }

    for (i, player) in lineup.iter().enumerate() {
        if lineup[..i].iter().any(|other| other.id == player.id) {
            return Err(LineupError::DuplicatePlayer(player.id.clone()));
        }
    }

    let cost: u64 = lineup.iter().map(|p| p.cost as u64).sum();
    if cost > budget as u64 {
        return Err(LineupError::OverBudget { cost, budget });
    }

    Ok(cost)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Run report: the best lineup plus ranked alternatives, as JSON or text.

use crate::runner::RunMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use squadopt_core::{FormationSummary, OptimizationResult, Position, SweepOutcome};
use std::fmt::Write;

/// Printed when no formation produced a lineup.
pub const NO_SOLUTION_MESSAGE: &str = "no valid lineup possible within budget";

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub budget: u32,
    pub formations_tried: usize,
    /// `None` serializes as `null`: nothing was feasible.
    pub best: Option<OptimizationResult>,
    /// Every feasible formation, best first.
    pub alternatives: Vec<FormationSummary>,
}

impl RunReport {
    pub fn new(mode: RunMode, budget: u32, outcome: &SweepOutcome) -> Self {
        Self::at(Utc::now(), mode, budget, outcome)
    }

    pub fn at(generated_at: DateTime<Utc>, mode: RunMode, budget: u32, outcome: &SweepOutcome) -> Self {
        RunReport {
            generated_at,
            mode,
            budget,
            formations_tried: outcome.formations_tried(),
            best: outcome.best().cloned(),
            alternatives: outcome.summaries(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable rendering for the terminal.
    pub fn render_text(&self) -> String {
        let Some(best) = &self.best else {
            return format!("{NO_SOLUTION_MESSAGE}\n");
        };

        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Mode: {}  Budget: {}", self.mode, self.budget);
        let _ = writeln!(
            out,
            "Best formation {} ({}): predicted {:.2}, cost {}, remaining {}",
            best.formation, best.method, best.objective, best.total_cost, best.remaining_budget
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<4} {:<12} {:<24} {:<16} {:>6} {:>8}",
            "POS", "ID", "NAME", "TEAM", "COST", "SCORE"
        );
        for position in Position::ALL {
            for player in best.players_at(position) {
                let _ = writeln!(
                    out,
                    "{:<4} {:<12} {:<24} {:<16} {:>6} {:>8.2}",
                    position.display_str(),
                    player.id,
                    player.display.get("name").map(String::as_str).unwrap_or("-"),
                    player.display.get("team").map(String::as_str).unwrap_or("-"),
                    player.cost,
                    player.predicted_score
                );
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Ranked formations ({} of {} feasible):",
            self.alternatives.len(),
            self.formations_tried
        );
        for (rank, summary) in self.alternatives.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>2}. {:<6} {:>8.2}  remaining {:>6}  {}",
                rank + 1,
                summary.formation,
                summary.objective,
                summary.remaining_budget,
                summary.method
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

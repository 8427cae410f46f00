// Structured events emitted while sweeping formations.
//
// The optimizer itself never logs; callers that want diagnostics pass a
// `SweepObserver`. `TracingObserver` forwards events to `tracing`.

use crate::exact::ExactFailure;
use crate::fallback::FallbackFailure;
use crate::lineup::SolveMethod;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SweepEvent<'a> {
    /// The eligible pool was prepared for a sweep.
    PoolPrepared {
        candidates: usize,
        eligible: usize,
        budget: u32,
    },
    FormationStarted {
        formation: &'a str,
    },
    ExactFailed {
        formation: &'a str,
        reason: &'a ExactFailure,
    },
    FallbackFailed {
        formation: &'a str,
        reason: &'a FallbackFailure,
    },
    FormationSolved {
        formation: &'a str,
        method: SolveMethod,
        objective: f64,
        remaining_budget: u32,
    },
    /// Neither solver produced a lineup for this formation.
    FormationInfeasible {
        formation: &'a str,
    },
    BestSelected {
        formation: &'a str,
        objective: f64,
        feasible_formations: usize,
    },
    NoSolution {
        formations_tried: usize,
    },
}

pub trait SweepObserver {
    fn on_event(&mut self, event: &SweepEvent<'_>);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {
    fn on_event(&mut self, _event: &SweepEvent<'_>) {}
}

/// Observer that logs each event through `tracing`.
///
/// Exact-solver anomalies (malformed or inconsistent output) log at warn;
/// ordinary infeasibility stays at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn on_event(&mut self, event: &SweepEvent<'_>) {
        match event {
            SweepEvent::PoolPrepared {
                candidates,
                eligible,
                budget,
            } => {
                info!("Pool prepared: {eligible} of {candidates} candidates eligible, budget {budget}");
            }
            SweepEvent::FormationStarted { formation } => {
                debug!("Evaluating formation {formation}");
            }
            SweepEvent::ExactFailed { formation, reason } if reason.is_anomaly() => {
                warn!("Exact solver anomaly for {formation}, using fallback: {reason}");
            }
            SweepEvent::ExactFailed { formation, reason } => {
                debug!("Exact solver failed for {formation}, using fallback: {reason}");
            }
            SweepEvent::FallbackFailed { formation, reason } if reason.is_anomaly() => {
                warn!("Fallback anomaly for {formation}: {reason}");
            }
            SweepEvent::FallbackFailed { formation, reason } => {
                debug!("Fallback failed for {formation}: {reason}");
            }
            SweepEvent::FormationSolved {
                formation,
                method,
                objective,
                remaining_budget,
            } => {
                info!(
                    "Formation {formation}: objective {objective:.2}, remaining {remaining_budget} ({method})"
                );
            }
            SweepEvent::FormationInfeasible { formation } => {
                info!("Formation {formation}: no feasible lineup");
            }
            SweepEvent::BestSelected {
                formation,
                objective,
                feasible_formations,
            } => {
                info!(
                    "Best formation {formation} with objective {objective:.2} ({feasible_formations} feasible)"
                );
            }
            SweepEvent::NoSolution { formations_tried } => {
                info!("No feasible lineup across {formations_tried} formations");
            }
        }
    }
}

/// Observer that keeps a plain-text trace of events. Handy in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<String>,
}

impl SweepObserver for RecordingObserver {
    fn on_event(&mut self, event: &SweepEvent<'_>) {
        let line = match event {
            SweepEvent::PoolPrepared { eligible, .. } => format!("pool:{eligible}"),
            SweepEvent::FormationStarted { formation } => format!("start:{formation}"),
            SweepEvent::ExactFailed { formation, .. } => format!("exact_failed:{formation}"),
            SweepEvent::FallbackFailed { formation, .. } => format!("fallback_failed:{formation}"),
            SweepEvent::FormationSolved {
                formation, method, ..
            } => format!("solved:{formation}:{method}"),
            SweepEvent::FormationInfeasible { formation } => format!("infeasible:{formation}"),
            SweepEvent::BestSelected { formation, .. } => format!("best:{formation}"),
            SweepEvent::NoSolution { .. } => "no_solution".to_string(),
        };
        self.events.push(line);
    }
}

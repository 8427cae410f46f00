// Formation sweep: run exact-then-fallback for each formation in the working
// set and rank the feasible results.
//
// Each formation gets exactly one exact attempt and, if that fails for any
// reason, one fallback attempt. Ranking is a stable sort on objective
// (descending) over results kept in enumeration order, so equal objectives
// resolve to the formation listed first.

use crate::backend::{BinaryProgramBackend, MicroLpBackend};
use crate::events::{NoopObserver, SweepEvent, SweepObserver};
use crate::exact::{ExactFailure, ExactSolver};
use crate::fallback::{self, FallbackFailure};
use crate::formation::{self, standard_formations, Formation};
use crate::lineup::{FormationSummary, OptimizationResult};
use crate::params::{OptimizerParams, ParamsError};
use crate::player::{prepare_pool, PlayerCandidate};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// Which formations a sweep evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormationScope {
    /// Every formation the optimizer knows, in enumeration order.
    #[default]
    All,
    Only(Formation),
}

#[derive(Debug, Clone, Default)]
pub struct OptimizeRequest {
    pub players: Vec<PlayerCandidate>,
    pub budget: u32,
    pub scope: FormationScope,
    /// Player ids treated as ineligible regardless of other fields.
    pub exclusions: HashSet<String>,
}

impl OptimizeRequest {
    pub fn new(players: Vec<PlayerCandidate>, budget: u32) -> Self {
        OptimizeRequest {
            players,
            budget,
            scope: FormationScope::All,
            exclusions: HashSet::new(),
        }
    }

    pub fn with_formation(mut self, formation: Formation) -> Self {
        self.scope = FormationScope::Only(formation);
        self
    }

    pub fn with_exclusions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Ranked per-formation results. An empty outcome is the "no solution"
/// signal: no formation produced a feasible lineup.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    ranked: Vec<OptimizationResult>,
    formations_tried: usize,
}

impl SweepOutcome {
    /// Rank results given in enumeration order.
    pub fn from_results(mut results: Vec<OptimizationResult>, formations_tried: usize) -> Self {
        results.sort_by(|a, b| b.objective.total_cmp(&a.objective));
        SweepOutcome {
            ranked: results,
            formations_tried,
        }
    }

    /// The highest-objective lineup, or `None` when nothing was feasible.
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.ranked.first()
    }

    pub fn into_best(self) -> Option<OptimizationResult> {
        self.ranked.into_iter().next()
    }

    /// All feasible results, best first.
    pub fn ranked(&self) -> &[OptimizationResult] {
        &self.ranked
    }

    pub fn summaries(&self) -> Vec<FormationSummary> {
        self.ranked.iter().map(OptimizationResult::summary).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn formations_tried(&self) -> usize {
        self.formations_tried
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Optimizer<B = MicroLpBackend> {
    exact: ExactSolver<B>,
    params: OptimizerParams,
    formations: Vec<Formation>,
}

impl Optimizer<MicroLpBackend> {
    /// microlp backend, default params, standard formations.
    pub fn standard() -> Self {
        let params = OptimizerParams::default();
        Optimizer {
            exact: ExactSolver::new(MicroLpBackend, params),
            params,
            formations: standard_formations(),
        }
    }
}

impl Default for Optimizer<MicroLpBackend> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<B: BinaryProgramBackend> Optimizer<B> {
    /// Build an optimizer over the standard formations.
    pub fn new(backend: B, params: OptimizerParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Optimizer {
            exact: ExactSolver::new(backend, params),
            params,
            formations: standard_formations(),
        })
    }

    /// Replace the known formations. The list order is the tie-break order.
    pub fn with_formations(mut self, formations: Vec<Formation>) -> Self {
        self.formations = formations;
        self
    }

    pub fn formations(&self) -> &[Formation] {
        &self.formations
    }

    pub fn formation(&self, tag: &str) -> Option<&Formation> {
        formation::find(&self.formations, tag)
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Formations a request's scope covers, in evaluation order.
    pub fn working_set<'a>(&'a self, scope: &'a FormationScope) -> Vec<&'a Formation> {
        match scope {
            FormationScope::All => self.formations.iter().collect(),
            FormationScope::Only(formation) => vec![formation],
        }
    }

    /// Sweep the request's formations one after another on the calling
    /// thread. Exact solves here have no time limit; callers that need one
    /// run each solve on a worker under a timeout and hand the result to
    /// [`Optimizer::finish_formation`].
    pub fn optimize(&self, request: &OptimizeRequest) -> SweepOutcome {
        self.optimize_with_observer(request, &mut NoopObserver)
    }

    pub fn optimize_with_observer(
        &self,
        request: &OptimizeRequest,
        observer: &mut dyn SweepObserver,
    ) -> SweepOutcome {
        let pool = prepare_pool(&request.players, request.budget, &request.exclusions);
        observer.on_event(&SweepEvent::PoolPrepared {
            candidates: request.players.len(),
            eligible: pool.len(),
            budget: request.budget,
        });

        let working_set = self.working_set(&request.scope);
        let results: Vec<OptimizationResult> = working_set
            .iter()
            .filter_map(|formation| {
                self.evaluate_formation(&pool, formation, request.budget, observer)
            })
            .collect();

        let outcome = SweepOutcome::from_results(results, working_set.len());
        report_outcome(&outcome, observer);
        outcome
    }

    /// Exact attempt, then fallback on any failure. `pool` must come from
    /// [`prepare_pool`].
    pub fn evaluate_formation(
        &self,
        pool: &[PlayerCandidate],
        formation: &Formation,
        budget: u32,
        observer: &mut dyn SweepObserver,
    ) -> Option<OptimizationResult> {
        observer.on_event(&SweepEvent::FormationStarted {
            formation: &formation.tag,
        });
        let exact = self.solve_exact(pool, formation, budget);
        self.finish_formation(pool, formation, budget, exact, observer)
    }

    /// Settle one formation given its exact attempt: keep a success, else
    /// run the fallback once. Emits the failure and result events.
    pub fn finish_formation(
        &self,
        pool: &[PlayerCandidate],
        formation: &Formation,
        budget: u32,
        exact: Result<OptimizationResult, ExactFailure>,
        observer: &mut dyn SweepObserver,
    ) -> Option<OptimizationResult> {
        let result = match exact {
            Ok(result) => Some(result),
            Err(reason) => {
                observer.on_event(&SweepEvent::ExactFailed {
                    formation: &formation.tag,
                    reason: &reason,
                });
                match self.solve_fallback(pool, formation, budget) {
                    Ok(result) => Some(result),
                    Err(reason) => {
                        observer.on_event(&SweepEvent::FallbackFailed {
                            formation: &formation.tag,
                            reason: &reason,
                        });
                        None
                    }
                }
            }
        };

        report_formation(formation, result.as_ref(), observer);
        result
    }

    pub fn solve_exact(
        &self,
        pool: &[PlayerCandidate],
        formation: &Formation,
        budget: u32,
    ) -> Result<OptimizationResult, ExactFailure> {
        self.exact.solve(pool, formation, budget)
    }

    pub fn solve_fallback(
        &self,
        pool: &[PlayerCandidate],
        formation: &Formation,
        budget: u32,
    ) -> Result<OptimizationResult, FallbackFailure> {
        fallback::solve(pool, formation, budget, &self.params)
    }
}

/// Emit the per-formation result event.
fn report_formation(
    formation: &Formation,
    result: Option<&OptimizationResult>,
    observer: &mut dyn SweepObserver,
) {
    match result {
        Some(result) => observer.on_event(&SweepEvent::FormationSolved {
            formation: &formation.tag,
            method: result.method,
            objective: result.objective,
            remaining_budget: result.remaining_budget,
        }),
        None => observer.on_event(&SweepEvent::FormationInfeasible {
            formation: &formation.tag,
        }),
    }
}

/// Emit the closing best / no-solution event.
pub fn report_outcome(outcome: &SweepOutcome, observer: &mut dyn SweepObserver) {
    match outcome.best() {
        Some(best) => observer.on_event(&SweepEvent::BestSelected {
            formation: &best.formation,
            objective: best.objective,
            feasible_formations: outcome.ranked().len(),
        }),
        None => observer.on_event(&SweepEvent::NoSolution {
            formations_tried: outcome.formations_tried(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendSolution, BinaryProgram};
    use crate::events::RecordingObserver;
    use crate::lineup::SolveMethod;
    use crate::player::Position;

    struct Down;

    impl BinaryProgramBackend for Down {
        fn name(&self) -> &str {
            "down"
        }

        fn solve(&self, _program: &BinaryProgram) -> Result<BackendSolution, BackendError> {
            Err(BackendError::Unavailable("offline".into()))
        }
    }

    fn p(id: &str, position: Position, cost: u32, score: f64) -> PlayerCandidate {
        PlayerCandidate::new(id, position, cost, score)
    }

    /// Strong defenders, weak forwards, all at the same cost.
    fn lopsided_pool() -> Vec<PlayerCandidate> {
        vec![
            p("gk", Position::Goalkeeper, 2, 1.0),
            p("d1", Position::Defender, 2, 10.0),
            p("d2", Position::Defender, 2, 8.0),
            p("f1", Position::Forward, 2, 3.0),
            p("f2", Position::Forward, 2, 2.0),
        ]
    }

    fn two_defenders() -> Formation {
        Formation::partial("A", 2, 0, 0)
    }

    fn two_forwards() -> Formation {
        Formation::partial("B", 0, 0, 2)
    }

    #[test]
    fn sweep_picks_higher_objective_formation() {
        let optimizer = Optimizer::standard().with_formations(vec![two_forwards(), two_defenders()]);
        let outcome = optimizer.optimize(&OptimizeRequest::new(lopsided_pool(), 100));

        let best = outcome.best().unwrap();
        assert_eq!(best.formation, "A");
        assert!((best.objective - 19.0).abs() < 1e-9);

        let summaries = outcome.summaries();
        let tags: Vec<&str> = summaries.iter().map(|s| s.formation.as_str()).collect();
        assert_eq!(tags, vec!["A", "B"]);
        assert!(summaries[0].objective > summaries[1].objective);
        assert!((summaries[1].objective - 6.0).abs() < 1e-9);
        assert_eq!(outcome.formations_tried(), 2);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let pool = vec![
            p("gk", Position::Goalkeeper, 1, 1.0),
            p("d", Position::Defender, 1, 5.0),
            p("f", Position::Forward, 1, 5.0),
        ];
        let x = Formation::partial("X", 1, 0, 0);
        let y = Formation::partial("Y", 0, 0, 1);

        let optimizer = Optimizer::standard().with_formations(vec![x.clone(), y.clone()]);
        let outcome = optimizer.optimize(&OptimizeRequest::new(pool.clone(), 10));
        assert_eq!(outcome.best().map(|r| r.formation.as_str()), Some("X"));

        let optimizer = Optimizer::standard().with_formations(vec![y, x]);
        let outcome = optimizer.optimize(&OptimizeRequest::new(pool, 10));
        assert_eq!(outcome.best().map(|r| r.formation.as_str()), Some("Y"));
    }

    #[test]
    fn single_formation_scope() {
        let optimizer = Optimizer::standard().with_formations(vec![two_defenders(), two_forwards()]);
        let request = OptimizeRequest::new(lopsided_pool(), 100).with_formation(two_forwards());
        let outcome = optimizer.optimize(&request);
        assert_eq!(outcome.ranked().len(), 1);
        assert_eq!(outcome.best().unwrap().formation, "B");
        assert_eq!(outcome.formations_tried(), 1);
    }

    #[test]
    fn exclusions_remove_players() {
        let optimizer = Optimizer::standard().with_formations(vec![two_defenders()]);
        let request = OptimizeRequest::new(lopsided_pool(), 100).with_exclusions(["d1"]);
        // Only one defender left: formation A is infeasible.
        assert!(optimizer.optimize(&request).is_empty());
    }

    #[test]
    fn backend_down_falls_back_for_every_formation() {
        let optimizer = Optimizer::new(Down, OptimizerParams::default())
            .unwrap()
            .with_formations(vec![two_defenders(), two_forwards()]);
        let mut observer = RecordingObserver::default();
        let outcome =
            optimizer.optimize_with_observer(&OptimizeRequest::new(lopsided_pool(), 100), &mut observer);

        assert_eq!(outcome.ranked().len(), 2);
        assert!(outcome.ranked().iter().all(|r| r.method == SolveMethod::Fallback));
        assert_eq!(
            observer.events,
            vec![
                "pool:5",
                "start:A",
                "exact_failed:A",
                "solved:A:fallback",
                "start:B",
                "exact_failed:B",
                "solved:B:fallback",
                "best:A",
            ]
        );
    }

    #[test]
    fn no_solution_is_an_empty_outcome() {
        let optimizer = Optimizer::standard();
        let mut observer = RecordingObserver::default();
        let outcome =
            optimizer.optimize_with_observer(&OptimizeRequest::new(lopsided_pool(), 1), &mut observer);

        assert!(outcome.is_empty());
        assert!(outcome.best().is_none());
        assert!(outcome.summaries().is_empty());
        assert_eq!(outcome.formations_tried(), 7);
        assert_eq!(observer.events.last().map(String::as_str), Some("no_solution"));
    }

    #[test]
    fn exact_success_skips_fallback() {
        let optimizer = Optimizer::standard().with_formations(vec![two_defenders()]);
        let mut observer = RecordingObserver::default();
        let outcome =
            optimizer.optimize_with_observer(&OptimizeRequest::new(lopsided_pool(), 100), &mut observer);
        assert_eq!(outcome.best().unwrap().method, SolveMethod::Exact);
        assert!(!observer.events.iter().any(|e| e.starts_with("exact_failed")));
    }

    #[test]
    fn repeated_ids_still_find_a_lineup() {
        let pool = vec![
            p("gk", Position::Goalkeeper, 1, 1.0),
            p("d0", Position::Defender, 1, 10.0),
            p("d0", Position::Defender, 1, 9.0),
            p("d1", Position::Defender, 1, 1.0),
        ];
        let request = OptimizeRequest::new(pool, 100).with_formation(two_defenders());

        let exact = Optimizer::standard().optimize(&request);
        let fallback_only = Optimizer::new(Down, OptimizerParams::default())
            .unwrap()
            .optimize(&request);

        for (outcome, method) in [(exact, SolveMethod::Exact), (fallback_only, SolveMethod::Fallback)] {
            let best = outcome.best().expect("gk, d0 and d1 form a valid lineup");
            let ids: Vec<&str> = best.lineup.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["gk", "d0", "d1"]);
            assert!((best.objective - 12.0).abs() < 1e-9);
            assert_eq!(best.method, method);
        }
    }

    #[test]
    fn finish_formation_keeps_exact_success() {
        let optimizer = Optimizer::standard();
        let pool = prepare_pool(&lopsided_pool(), 100, &HashSet::new());
        let exact = optimizer.solve_exact(&pool, &two_defenders(), 100);
        assert!(exact.is_ok());

        let mut observer = RecordingObserver::default();
        let result = optimizer.finish_formation(&pool, &two_defenders(), 100, exact, &mut observer);
        assert_eq!(result.map(|r| r.method), Some(SolveMethod::Exact));
        assert_eq!(observer.events, vec!["solved:A:exact"]);
    }

    #[test]
    fn finish_formation_falls_back_after_exact_failure() {
        let optimizer = Optimizer::standard();
        let pool = prepare_pool(&lopsided_pool(), 100, &HashSet::new());
        let timed_out = Err(ExactFailure::TimedOut(std::time::Duration::from_millis(5)));

        let mut observer = RecordingObserver::default();
        let result = optimizer.finish_formation(&pool, &two_defenders(), 100, timed_out, &mut observer);
        assert_eq!(result.map(|r| r.method), Some(SolveMethod::Fallback));
        assert_eq!(observer.events, vec!["exact_failed:A", "solved:A:fallback"]);
    }

    #[test]
    fn finish_formation_reports_fallback_failure() {
        let optimizer = Optimizer::standard();
        let three_defenders = Formation::partial("C", 3, 0, 0);
        let pool = prepare_pool(&lopsided_pool(), 100, &HashSet::new());

        let mut observer = RecordingObserver::default();
        let result = optimizer.finish_formation(
            &pool,
            &three_defenders,
            100,
            Err(ExactFailure::EmptyPool),
            &mut observer,
        );
        assert!(result.is_none());
        assert_eq!(
            observer.events,
            vec!["exact_failed:C", "fallback_failed:C", "infeasible:C"]
        );
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = OptimizerParams {
            improvement_threshold: -1.0,
            ..Default::default()
        };
        assert!(Optimizer::new(MicroLpBackend, params).is_err());
    }

    #[test]
    fn from_results_ranks_descending() {
        let formation = Formation::partial("gk", 0, 0, 0);
        let make = |score: f64| {
            OptimizationResult::build(
                &formation,
                vec![p("g", Position::Goalkeeper, 0, score)],
                0,
                SolveMethod::Exact,
            )
            .unwrap()
        };
        let outcome = SweepOutcome::from_results(vec![make(1.0), make(3.0), make(2.0)], 3);
        let objectives: Vec<f64> = outcome.ranked().iter().map(|r| r.objective).collect();
        assert_eq!(objectives, vec![3.0, 2.0, 1.0]);
        assert_eq!(outcome.into_best().map(|r| r.objective), Some(3.0));
    }
}

// Request building for the two call-site modes and the async sweep driver.
//
// Both modes run the same optimizer; they differ only in the request:
// - General: caller-chosen budget and formation scope.
// - Fixed budget: unfit players dropped, configured constant budget, every
//   formation.
//
// The driver runs each formation's exact solve on the blocking pool,
// optionally bounded by a timeout, then finishes formations (fallback,
// events) in enumeration order so ranking ties resolve exactly as in a
// sequential sweep.

use crate::config::{Config, OptimizerConfig};
use crate::pool::PlayerPool;
use serde::Serialize;
use squadopt_core::events::{SweepEvent, SweepObserver};
use squadopt_core::params::ParamsError;
use squadopt_core::sweep::report_outcome;
use squadopt_core::{
    prepare_pool, BinaryProgramBackend, ExactFailure, Formation, FormationError, FormationScope,
    MicroLpBackend, OptimizationResult, OptimizeRequest, Optimizer, PlayerCandidate,
    SweepOutcome, TracingObserver,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    General,
    /// Auto-exclude unfit players at the configured fixed budget.
    FixedBudget,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::General => write!(f, "general"),
            RunMode::FixedBudget => write!(f, "fixed_budget"),
        }
    }
}

/// Per-run overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub budget: Option<u32>,
    pub formation: Option<String>,
    /// Extra excluded ids, on top of `[exclusions].ids`.
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSettings {
    pub parallel: bool,
    pub exact_timeout: Option<Duration>,
}

impl SweepSettings {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        SweepSettings {
            parallel: config.parallel,
            exact_timeout: config.exact_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid optimizer parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("invalid formation: {0}")]
    Formation(#[from] FormationError),

    #[error("budget must be greater than 0")]
    ZeroBudget,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// The microlp-backed optimizer with the configured params and formation
/// order.
pub fn build_optimizer(config: &Config) -> Result<Optimizer, RunError> {
    let optimizer = Optimizer::new(MicroLpBackend, config.optimizer.params)?
        .with_formations(config.formations.clone());
    Ok(optimizer)
}

pub fn build_request<B: BinaryProgramBackend>(
    mode: RunMode,
    config: &Config,
    pool: &PlayerPool,
    optimizer: &Optimizer<B>,
    options: &RunOptions,
) -> Result<OptimizeRequest, RunError> {
    match mode {
        RunMode::General => general_request(config, pool, optimizer, options),
        RunMode::FixedBudget => Ok(fixed_budget_request(config, pool, options)),
    }
}

/// Budget from the options or `[budget].default`; scope from the options
/// or every formation.
pub fn general_request<B: BinaryProgramBackend>(
    config: &Config,
    pool: &PlayerPool,
    optimizer: &Optimizer<B>,
    options: &RunOptions,
) -> Result<OptimizeRequest, RunError> {
    let budget = options.budget.unwrap_or(config.budget.default);
    if budget == 0 {
        return Err(RunError::ZeroBudget);
    }

    let mut request = OptimizeRequest::new(pool.candidates(), budget)
        .with_exclusions(config.exclusions.iter().cloned())
        .with_exclusions(options.exclude.iter().cloned());

    if let Some(tag) = &options.formation {
        let formation = match optimizer.formation(tag) {
            Some(known) => known.clone(),
            None => Formation::parse(tag)?,
        };
        request = request.with_formation(formation);
    }

    Ok(request)
}

/// Unfit players removed, `[budget].fixed`, every formation.
pub fn fixed_budget_request(config: &Config, pool: &PlayerPool, options: &RunOptions) -> OptimizeRequest {
    if options.budget.is_some() {
        warn!("budget override ignored in fixed-budget mode");
    }
    if options.formation.is_some() {
        warn!("formation override ignored in fixed-budget mode");
    }

    let unavailable = &config.availability.unavailable;
    let players = pool.fit_candidates(unavailable);
    info!(
        "Fixed-budget mode: {} of {} players fit, budget {}",
        players.len(),
        pool.len(),
        config.budget.fixed
    );

    OptimizeRequest::new(players, config.budget.fixed)
        .with_exclusions(config.exclusions.iter().cloned())
        .with_exclusions(options.exclude.iter().cloned())
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Run a sweep, logging progress through `tracing`.
pub async fn run<B>(
    optimizer: Arc<Optimizer<B>>,
    request: OptimizeRequest,
    settings: SweepSettings,
) -> SweepOutcome
where
    B: BinaryProgramBackend + 'static,
{
    run_with_observer(optimizer, request, settings, &mut TracingObserver).await
}

/// Sweep the request's formations. With `parallel` every exact solve is
/// in flight at once; otherwise they run one after another. Either way a
/// solve that outlives `exact_timeout` counts as an exact failure.
pub async fn run_with_observer<B>(
    optimizer: Arc<Optimizer<B>>,
    request: OptimizeRequest,
    settings: SweepSettings,
    observer: &mut dyn SweepObserver,
) -> SweepOutcome
where
    B: BinaryProgramBackend + 'static,
{
    let budget = request.budget;
    let pool = Arc::new(prepare_pool(&request.players, budget, &request.exclusions));
    observer.on_event(&SweepEvent::PoolPrepared {
        candidates: request.players.len(),
        eligible: pool.len(),
        budget,
    });

    let working_set: Vec<Formation> = match &request.scope {
        FormationScope::All => optimizer.formations().to_vec(),
        FormationScope::Only(formation) => vec![formation.clone()],
    };

    let exact_results: Vec<Result<OptimizationResult, ExactFailure>> = if settings.parallel {
        let handles: Vec<_> = working_set
            .iter()
            .map(|formation| {
                tokio::spawn(bounded_exact(
                    Arc::clone(&optimizer),
                    Arc::clone(&pool),
                    formation.clone(),
                    budget,
                    settings.exact_timeout,
                ))
            })
            .collect();

        // Awaited in spawn order, so results stay in enumeration order.
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .unwrap_or_else(|e| Err(ExactFailure::Panicked(e.to_string()))),
            );
        }
        results
    } else {
        let mut results = Vec::with_capacity(working_set.len());
        for formation in &working_set {
            results.push(
                bounded_exact(
                    Arc::clone(&optimizer),
                    Arc::clone(&pool),
                    formation.clone(),
                    budget,
                    settings.exact_timeout,
                )
                .await,
            );
        }
        results
    };

    let mut results = Vec::with_capacity(working_set.len());
    for (formation, exact) in working_set.iter().zip(exact_results) {
        observer.on_event(&SweepEvent::FormationStarted {
            formation: &formation.tag,
        });
        results.extend(optimizer.finish_formation(&pool, formation, budget, exact, observer));
    }

    let outcome = SweepOutcome::from_results(results, working_set.len());
    report_outcome(&outcome, observer);
    outcome
}

/// One exact solve on the blocking pool. A timed-out solve keeps running in
/// the background; its result is discarded.
async fn bounded_exact<B>(
    optimizer: Arc<Optimizer<B>>,
    pool: Arc<Vec<PlayerCandidate>>,
    formation: Formation,
    budget: u32,
    limit: Option<Duration>,
) -> Result<OptimizationResult, ExactFailure>
where
    B: BinaryProgramBackend + 'static,
{
    let task = tokio::task::spawn_blocking(move || optimizer.solve_exact(&pool, &formation, budget));
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => return Err(ExactFailure::TimedOut(limit)),
        },
        None => task.await,
    };
    joined.unwrap_or_else(|e| Err(ExactFailure::Panicked(e.to_string())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AvailabilityConfig, BudgetConfig, DataPaths};
    use crate::pool::{Availability, PoolPlayer};
    use squadopt_core::backend::{BackendError, BackendSolution, BinaryProgram};
    use squadopt_core::events::RecordingObserver;
    use squadopt_core::{standard_formations, OptimizerParams, Position, SolveMethod};
    use std::collections::HashSet;

    fn inline_config() -> Config {
        Config {
            budget: BudgetConfig {
                default: 1000,
                fixed: 700,
            },
            optimizer: OptimizerConfig {
                params: OptimizerParams::default(),
                parallel: false,
                exact_timeout_ms: None,
            },
            formations: standard_formations(),
            data_paths: DataPaths {
                players: "unused.csv".into(),
            },
            exclusions: HashSet::from(["banned".to_string()]),
            availability: AvailabilityConfig::default(),
        }
    }

    fn player(id: &str, position: Position, cost: u32, score: f64, status: Availability) -> PoolPlayer {
        PoolPlayer {
            candidate: PlayerCandidate::new(id, position, cost, score),
            availability: status,
        }
    }

    /// 2 GK, 6 DEF, 6 MID, 4 FWD. One injured star midfielder, one banned
    /// forward.
    fn squad_pool() -> PlayerPool {
        let mut players = vec![
            player("gk1", Position::Goalkeeper, 50, 5.0, Availability::Available),
            player("gk2", Position::Goalkeeper, 40, 4.0, Availability::Available),
        ];
        for i in 0..6 {
            players.push(player(
                &format!("d{i}"),
                Position::Defender,
                45 + i * 5,
                4.0 + i as f64,
                Availability::Available,
            ));
            players.push(player(
                &format!("m{i}"),
                Position::Midfielder,
                55 + i * 5,
                5.0 + i as f64,
                Availability::Available,
            ));
        }
        players.push(player("star", Position::Midfielder, 60, 20.0, Availability::Injured));
        for i in 0..3 {
            players.push(player(
                &format!("f{i}"),
                Position::Forward,
                60 + i * 10,
                6.0 + i as f64,
                Availability::Available,
            ));
        }
        players.push(player("banned", Position::Forward, 40, 30.0, Availability::Available));
        PlayerPool { players }
    }

    fn ids(result: &OptimizationResult) -> Vec<&str> {
        result.lineup.iter().map(|p| p.id.as_str()).collect()
    }

    // -- Request building ----------------------------------------------------

    #[test]
    fn general_request_uses_default_budget_and_all_formations() {
        let config = inline_config();
        let optimizer = build_optimizer(&config).unwrap();
        let request = general_request(&config, &squad_pool(), &optimizer, &RunOptions::default()).unwrap();

        assert_eq!(request.budget, 1000);
        assert_eq!(request.scope, FormationScope::All);
        assert_eq!(request.players.len(), squad_pool().len());
        assert!(request.exclusions.contains("banned"));
    }

    #[test]
    fn general_request_applies_overrides() {
        let config = inline_config();
        let optimizer = build_optimizer(&config).unwrap();
        let options = RunOptions {
            budget: Some(650),
            formation: Some("3-5-2".into()),
            exclude: vec!["gk1".into()],
        };
        let request = general_request(&config, &squad_pool(), &optimizer, &options).unwrap();

        assert_eq!(request.budget, 650);
        match &request.scope {
            FormationScope::Only(f) => assert_eq!(f.tag, "3-5-2"),
            other => panic!("expected a single formation, got {other:?}"),
        }
        assert!(request.exclusions.contains("gk1"));
        assert!(request.exclusions.contains("banned"));
    }

    #[test]
    fn general_request_accepts_unlisted_but_valid_formation() {
        let mut config = inline_config();
        config.formations = vec![Formation::parse("4-4-2").unwrap()];
        let optimizer = build_optimizer(&config).unwrap();
        let options = RunOptions {
            formation: Some("3-4-3".into()),
            ..Default::default()
        };
        let request = general_request(&config, &squad_pool(), &optimizer, &options).unwrap();
        assert!(matches!(request.scope, FormationScope::Only(ref f) if f.forwards == 3));
    }

    #[test]
    fn general_request_rejects_bad_formation_and_zero_budget() {
        let config = inline_config();
        let optimizer = build_optimizer(&config).unwrap();

        let bad_formation = RunOptions {
            formation: Some("4-4-4".into()),
            ..Default::default()
        };
        assert!(matches!(
            general_request(&config, &squad_pool(), &optimizer, &bad_formation),
            Err(RunError::Formation(_))
        ));

        let zero = RunOptions {
            budget: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            general_request(&config, &squad_pool(), &optimizer, &zero),
            Err(RunError::ZeroBudget)
        ));
    }

    #[test]
    fn fixed_budget_request_drops_unfit_players() {
        let config = inline_config();
        let options = RunOptions {
            budget: Some(5),
            formation: Some("4-4-2".into()),
            exclude: vec![],
        };
        let request = fixed_budget_request(&config, &squad_pool(), &options);

        assert_eq!(request.budget, 700);
        assert_eq!(request.scope, FormationScope::All);
        assert!(request.players.iter().all(|p| p.id != "star"));
        assert_eq!(request.players.len(), squad_pool().len() - 1);
        assert!(request.exclusions.contains("banned"));
    }

    #[test]
    fn build_request_dispatches_on_mode() {
        let config = inline_config();
        let optimizer = build_optimizer(&config).unwrap();
        let options = RunOptions::default();
        let general = build_request(RunMode::General, &config, &squad_pool(), &optimizer, &options).unwrap();
        let fixed = build_request(RunMode::FixedBudget, &config, &squad_pool(), &optimizer, &options).unwrap();
        assert_eq!(general.budget, 1000);
        assert_eq!(fixed.budget, 700);
    }

    #[test]
    fn build_optimizer_rejects_invalid_params() {
        let mut config = inline_config();
        config.optimizer.params.score_weight = 0.0;
        config.optimizer.params.cost_weight = 0.0;
        assert!(matches!(build_optimizer(&config), Err(RunError::Params(_))));
    }

    #[test]
    fn settings_from_config() {
        let mut config = inline_config();
        config.optimizer.parallel = true;
        config.optimizer.exact_timeout_ms = Some(250);
        let settings = SweepSettings::from_config(&config.optimizer);
        assert!(settings.parallel);
        assert_eq!(settings.exact_timeout, Some(Duration::from_millis(250)));
    }

    // -- Running -------------------------------------------------------------

    #[tokio::test]
    async fn parallel_and_sequential_sweeps_agree() {
        let config = inline_config();
        let optimizer = Arc::new(build_optimizer(&config).unwrap());
        let request = general_request(&config, &squad_pool(), &optimizer, &RunOptions::default()).unwrap();

        let sequential = run(Arc::clone(&optimizer), request.clone(), SweepSettings::default()).await;
        let parallel = run(
            Arc::clone(&optimizer),
            request.clone(),
            SweepSettings {
                parallel: true,
                exact_timeout: None,
            },
        )
        .await;
        let in_core = optimizer.optimize(&request);

        assert!(!sequential.is_empty());
        assert_eq!(sequential, parallel);
        assert_eq!(sequential, in_core);
    }

    #[tokio::test]
    async fn fixed_budget_sweep_never_picks_unfit_or_excluded() {
        let config = inline_config();
        let optimizer = Arc::new(build_optimizer(&config).unwrap());
        let request = fixed_budget_request(&config, &squad_pool(), &RunOptions::default());
        let outcome = run(optimizer, request, SweepSettings::default()).await;

        assert!(!outcome.is_empty());
        for result in outcome.ranked() {
            assert!(!ids(result).contains(&"star"));
            assert!(!ids(result).contains(&"banned"));
            assert!(result.total_cost <= 700);
        }
    }

    #[tokio::test]
    async fn events_follow_enumeration_order_in_parallel() {
        let config = inline_config();
        let optimizer = Arc::new(build_optimizer(&config).unwrap().with_formations(vec![
            Formation::parse("5-4-1").unwrap(),
            Formation::parse("4-4-2").unwrap(),
        ]));
        let request = general_request(&config, &squad_pool(), &optimizer, &RunOptions::default()).unwrap();
        let mut observer = RecordingObserver::default();
        let settings = SweepSettings {
            parallel: true,
            exact_timeout: None,
        };
        run_with_observer(optimizer, request, settings, &mut observer).await;

        let starts: Vec<&str> = observer
            .events
            .iter()
            .filter(|e| e.starts_with("start:"))
            .map(String::as_str)
            .collect();
        assert_eq!(starts, vec!["start:5-4-1", "start:4-4-2"]);
        assert!(observer.events[0].starts_with("pool:"));
        assert!(observer.events.last().unwrap().starts_with("best:"));
    }

    /// Backend that sleeps past any reasonable timeout before failing.
    struct Sluggish(Duration);

    impl BinaryProgramBackend for Sluggish {
        fn name(&self) -> &str {
            "sluggish"
        }

        fn solve(&self, _program: &BinaryProgram) -> Result<BackendSolution, BackendError> {
            std::thread::sleep(self.0);
            Err(BackendError::Solver("too late".into()))
        }
    }

    #[derive(Default)]
    struct FailureLog(Vec<ExactFailure>);

    impl SweepObserver for FailureLog {
        fn on_event(&mut self, event: &SweepEvent<'_>) {
            if let SweepEvent::ExactFailed { reason, .. } = event {
                self.0.push((*reason).clone());
            }
        }
    }

    #[tokio::test]
    async fn timed_out_exact_solve_falls_back() {
        let optimizer = Arc::new(
            Optimizer::new(Sluggish(Duration::from_millis(300)), OptimizerParams::default())
                .unwrap()
                .with_formations(vec![Formation::parse("4-4-2").unwrap()]),
        );
        let request = OptimizeRequest::new(squad_pool().candidates(), 1000);
        let limit = Duration::from_millis(20);
        let mut failures = FailureLog::default();
        let outcome = run_with_observer(
            optimizer,
            request,
            SweepSettings {
                parallel: true,
                exact_timeout: Some(limit),
            },
            &mut failures,
        )
        .await;

        assert_eq!(failures.0, vec![ExactFailure::TimedOut(limit)]);
        let best = outcome.best().expect("fallback lineup");
        assert_eq!(best.method, SolveMethod::Fallback);
        assert_eq!(best.lineup.len(), 11);
    }

    #[tokio::test]
    async fn sequential_sweep_honors_timeout() {
        let optimizer = Arc::new(
            Optimizer::new(Sluggish(Duration::from_millis(300)), OptimizerParams::default())
                .unwrap()
                .with_formations(vec![Formation::parse("4-4-2").unwrap()]),
        );
        let request = OptimizeRequest::new(squad_pool().candidates(), 1000);
        let mut failures = FailureLog::default();
        let outcome = run_with_observer(
            optimizer,
            request,
            SweepSettings {
                parallel: false,
                exact_timeout: Some(Duration::from_millis(20)),
            },
            &mut failures,
        )
        .await;

        assert!(matches!(failures.0.as_slice(), [ExactFailure::TimedOut(_)]));
        assert_eq!(outcome.best().map(|r| r.method), Some(SolveMethod::Fallback));
    }

    #[tokio::test]
    async fn driver_settles_formations_like_the_core_sweep() {
        let optimizer = Arc::new(
            Optimizer::new(Sluggish(Duration::from_millis(300)), OptimizerParams::default())
                .unwrap()
                .with_formations(vec![Formation::parse("4-4-2").unwrap()]),
        );
        let request = OptimizeRequest::new(squad_pool().candidates(), 1000);
        let eligible = squad_pool().len();
        let mut observer = RecordingObserver::default();
        run_with_observer(
            optimizer,
            request,
            SweepSettings {
                parallel: true,
                exact_timeout: Some(Duration::from_millis(20)),
            },
            &mut observer,
        )
        .await;

        assert_eq!(
            observer.events,
            vec![
                format!("pool:{eligible}"),
                "start:4-4-2".to_string(),
                "exact_failed:4-4-2".to_string(),
                "solved:4-4-2:fallback".to_string(),
                "best:4-4-2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn empty_pool_yields_no_solution() {
        let config = inline_config();
        let optimizer = Arc::new(build_optimizer(&config).unwrap());
        let request = OptimizeRequest::new(Vec::new(), 1000);
        let mut observer = RecordingObserver::default();
        let outcome = run_with_observer(optimizer, request, SweepSettings::default(), &mut observer).await;

        assert!(outcome.is_empty());
        assert_eq!(outcome.formations_tried(), 7);
        assert_eq!(observer.events.last().map(String::as_str), Some("no_solution"));
    }
}

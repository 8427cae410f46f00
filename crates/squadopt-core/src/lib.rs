// Squad optimizer: pick the eleven players that maximize predicted score
// for a formation and budget, with an exact binary-program solve and a
// greedy fallback, swept across every known formation.

pub mod backend;
pub mod events;
pub mod exact;
pub mod fallback;
pub mod formation;
pub mod lineup;
pub mod params;
pub mod player;
pub mod sweep;

pub use backend::{BinaryProgramBackend, MicroLpBackend};
pub use events::{NoopObserver, SweepEvent, SweepObserver, TracingObserver};
pub use exact::{ExactFailure, ExactSolver};
pub use fallback::FallbackFailure;
pub use formation::{standard_formations, Formation, FormationError};
pub use lineup::{FormationSummary, LineupError, OptimizationResult, SolveMethod};
pub use params::OptimizerParams;
pub use player::{prepare_pool, PlayerCandidate, Position};
pub use sweep::{FormationScope, OptimizeRequest, Optimizer, SweepOutcome};

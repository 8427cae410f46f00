// Binary integer program backend.
//
// The exact solver formulates its problem as a `BinaryProgram` and hands it
// to any `BinaryProgramBackend`. The backend is a black box: it receives an
// objective plus linear constraints over binary variables and returns a
// status and, when it has one, an assignment.

use good_lp::solvers::microlp::microlp;
use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use std::fmt;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Problem description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    LessOrEqual,
}

/// `sum(coefficient * x[index]) <relation> rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Maximize `sum(objective[i] * x[i])` over binary `x` subject to
/// `constraints`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryProgram {
    pub objective: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

impl BinaryProgram {
    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }
}

// ---------------------------------------------------------------------------
// Backend outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    Unknown,
}

impl SolveStatus {
    /// Whether an assignment with this status may be used.
    pub fn is_usable(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendSolution {
    pub status: SolveStatus,
    /// One value per variable, in variable order. Missing when the backend
    /// produced no assignment.
    pub values: Option<Vec<f64>>,
}

impl BackendSolution {
    pub fn without_values(status: SolveStatus) -> Self {
        BackendSolution {
            status,
            values: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("solver backend unavailable: {0}")]
    Unavailable(String),

    #[error("solver failed: {0}")]
    Solver(String),
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

pub trait BinaryProgramBackend: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    fn solve(&self, program: &BinaryProgram) -> Result<BackendSolution, BackendError>;
}

impl<B: BinaryProgramBackend + ?Sized> BinaryProgramBackend for std::sync::Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(&self, program: &BinaryProgram) -> Result<BackendSolution, BackendError> {
        (**self).solve(program)
    }
}

// ---------------------------------------------------------------------------
// microlp backend (pure Rust branch and bound via good_lp)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpBackend;

impl BinaryProgramBackend for MicroLpBackend {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, program: &BinaryProgram) -> Result<BackendSolution, BackendError> {
        let mut vars = ProblemVariables::new();
        let xs: Vec<Variable> = (0..program.num_variables())
            .map(|_| vars.add(variable().binary()))
            .collect();

        let mut objective = Expression::with_capacity(xs.len());
        for (&coefficient, &x) in program.objective.iter().zip(&xs) {
            objective.add_mul(coefficient, x);
        }

        let mut model = vars.maximise(objective).using(microlp);
        for constraint in &program.constraints {
            let mut lhs = Expression::with_capacity(constraint.terms.len());
            for &(index, coefficient) in &constraint.terms {
                let x = xs.get(index).ok_or_else(|| {
                    BackendError::Solver(format!(
                        "constraint `{}` references variable {} of {}",
                        constraint.name,
                        index,
                        xs.len()
                    ))
                })?;
                lhs.add_mul(coefficient, *x);
            }
            model = match constraint.relation {
                Relation::Equal => model.with(lhs.eq(constraint.rhs)),
                Relation::LessOrEqual => model.with(lhs.leq(constraint.rhs)),
            };
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = xs.iter().map(|&x| solution.value(x)).collect();
                debug!("microlp solved {} variables", values.len());
                Ok(BackendSolution {
                    status: SolveStatus::Optimal,
                    values: Some(values),
                })
            }
            Err(ResolutionError::Infeasible) => {
                Ok(BackendSolution::without_values(SolveStatus::Infeasible))
            }
            Err(ResolutionError::Unbounded) => {
                Ok(BackendSolution::without_values(SolveStatus::Unbounded))
            }
            Err(e) => Err(BackendError::Solver(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Thin adapter handing an assembled model to the linear solver.

use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use good_lp::{Expression, ResolutionError, Solution, SolverModel, highs};

use crate::opt::model::DispatchModel;

/// Options forwarded to a single solve.
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Optional wall-clock budget, forwarded to the backend as its
    /// `time_limit` option so the solve is interrupted at the deadline. The
    /// backend's limit-reached failure is classified as
    /// [`SolveError::Timeout`]; a successful solve is returned even if it
    /// finished close to the deadline.
    pub time_limit: Option<Duration>,
}

/// Why a solve produced no usable assignment.
///
/// Every variant is fatal for the cycle that requested the solve: the
/// controller never rolls partial results forward.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    /// No feasible assignment exists (e.g. soc bounds contradict an anchor).
    Infeasible,
    /// The objective is unbounded; the model is missing a bound.
    Unbounded,
    /// The solver failed after exhausting the wall-clock budget.
    Timeout,
    /// Any other backend failure.
    Solver(String),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Infeasible => write!(f, "no feasible dispatch exists"),
            SolveError::Unbounded => write!(f, "objective is unbounded"),
            SolveError::Timeout => write!(f, "solver exceeded its time budget"),
            SolveError::Solver(msg) => write!(f, "solver failure: {msg}"),
        }
    }
}

impl Error for SolveError {}

/// Read-only record of one solved horizon.
///
/// Holds a resolved value for every decision variable plus the objective
/// value. Nothing here references solver state; the model that produced it is
/// consumed by [`solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedDispatch {
    /// State of charge per step.
    pub soc: Vec<f64>,
    /// Discharge power per step (non-negative).
    pub export: Vec<f64>,
    /// Charge power per step (non-positive).
    pub import: Vec<f64>,
    /// `buy[m][p]`: bought energy per market and step (non-positive).
    pub buy: Vec<Vec<f64>>,
    /// `sell[m][p]`: sold energy per market and step (non-negative).
    pub sell: Vec<Vec<f64>>,
    /// Objective value of the solved assignment.
    pub objective_value: f64,
}

/// Solves one assembled model, maximizing `objective`.
///
/// Pure with respect to the adapter: no solver state survives between calls,
/// matching the rebuild-per-cycle strategy. The call blocks until the backend
/// returns; there are no partial or streaming results.
///
/// # Errors
///
/// Returns a [`SolveError`] if the backend reports an infeasible or unbounded
/// model, or fails for any other reason. With a time limit set, the backend
/// is told to stop at the deadline and its failure is reported as
/// [`SolveError::Timeout`].
pub fn solve(
    model: DispatchModel,
    objective: Expression,
    options: &SolveOptions,
) -> Result<SolvedDispatch, SolveError> {
    let DispatchModel {
        vars,
        constraints,
        buy,
        sell,
        soc,
        export,
        import,
        steps: _,
    } = model;

    let started = Instant::now();
    let mut problem = vars.maximise(objective.clone()).using(highs);
    if let Some(limit) = options.time_limit {
        problem = problem.set_option("time_limit", limit.as_secs_f64());
    }
    for c in constraints {
        problem = problem.with(c);
    }

    match problem.solve() {
        Ok(solution) => Ok(SolvedDispatch {
            soc: soc.iter().map(|&v| solution.value(v)).collect(),
            export: export.iter().map(|&v| solution.value(v)).collect(),
            import: import.iter().map(|&v| solution.value(v)).collect(),
            buy: buy
                .iter()
                .map(|row| row.iter().map(|&v| solution.value(v)).collect())
                .collect(),
            sell: sell
                .iter()
                .map(|row| row.iter().map(|&v| solution.value(v)).collect())
                .collect(),
            objective_value: solution.eval(objective),
        }),
        Err(error) => Err(classify_failure(error, started.elapsed(), options)),
    }
}

/// Maps a backend failure onto the [`SolveError`] taxonomy.
///
/// The backend has no dedicated limit-reached variant, so any failure that is
/// neither infeasible nor unbounded and arrives at or past the configured
/// deadline is a [`SolveError::Timeout`].
fn classify_failure(
    error: ResolutionError,
    elapsed: Duration,
    options: &SolveOptions,
) -> SolveError {
    match error {
        ResolutionError::Infeasible => SolveError::Infeasible,
        ResolutionError::Unbounded => SolveError::Unbounded,
        other => {
            let over_budget = options.time_limit.is_some_and(|limit| elapsed >= limit);
            if over_budget {
                SolveError::Timeout
            } else {
                SolveError::Solver(format!("{other:?}"))
            }
        }
    }
}

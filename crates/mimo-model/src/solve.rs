//! Solving a built model with the pure-Rust Clarabel interior-point solver.

use crate::model::ModelParts;
use crate::{Model, Results, Termination};
use good_lp::solvers::clarabel::clarabel;
use good_lp::{Constraint, Expression, ResolutionError, Solution, SolverModel, Variable};
use indexmap::IndexMap;
use mimo_core::{MimoError, MimoResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Values with a smaller magnitude are reported as zero
    pub zero_tolerance: f64,
    /// Log the solution summary at info level
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            zero_tolerance: 1e-7,
            verbose: false,
        }
    }
}

/// Solve a built model.
///
/// Infeasible and unbounded models return `Ok` with the matching
/// [`Termination`]; other solver failures are errors.
///
/// # Example
///
/// ```no_run
/// use mimo_core::{EnergySystem, TimeIndex};
/// use mimo_model::{solve, Model, SolverConfig};
///
/// let es = EnergySystem::new(TimeIndex::new(24)); // add buses and components
/// let model = Model::new(&es)?;
/// let results = solve(model, &SolverConfig::default())?;
/// println!("{}", results.summary());
/// # Ok::<(), mimo_core::MimoError>(())
/// ```
pub fn solve(model: Model, config: &SolverConfig) -> MimoResult<Results> {
    let start = Instant::now();
    let ModelParts {
        vars,
        constraints,
        objective,
        flows,
        investments,
        group_flows,
    } = model.into_parts();

    let mut objective_expr = Expression::from(0.0);
    for &(coefficient, var) in &objective {
        objective_expr += coefficient * var;
    }

    debug!(constraints = constraints.len(), "solving with clarabel");
    let problem = vars.minimise(objective_expr).using(clarabel);
    let outcome = solve_with(problem, constraints);

    let solution = match outcome {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => {
            info!(elapsed = ?start.elapsed(), "model infeasible");
            return Ok(Results::unsolved(Termination::Infeasible, start.elapsed()));
        }
        Err(ResolutionError::Unbounded) => {
            info!(elapsed = ?start.elapsed(), "model unbounded");
            return Ok(Results::unsolved(Termination::Unbounded, start.elapsed()));
        }
        Err(e) => return Err(MimoError::Solver(e.to_string())),
    };

    let tol = config.zero_tolerance;
    let value = |var: Variable| {
        let v = solution.value(var);
        if v.abs() < tol {
            0.0
        } else {
            v
        }
    };
    let series = |vars: Vec<Variable>| vars.into_iter().map(&value).collect::<Vec<_>>();

    let objective_value: f64 = objective
        .iter()
        .map(|&(coefficient, var)| coefficient * solution.value(var))
        .sum();

    let results = Results {
        termination: Termination::Optimal,
        objective: Some(objective_value),
        solve_time: start.elapsed(),
        flows: flows.into_iter().map(|(k, v)| (k, series(v))).collect(),
        invest: investments
            .into_iter()
            .map(|(k, inv)| (k, value(inv.var)))
            .collect::<IndexMap<_, _>>(),
        group_flows: group_flows
            .into_iter()
            .map(|(k, v)| (k, series(v)))
            .collect(),
    };

    if config.verbose {
        info!("{}", results.summary());
    }
    info!(
        termination = %results.termination,
        objective = objective_value,
        elapsed = ?results.solve_time,
        "model solved"
    );
    Ok(results)
}

/// Attach all constraints to `problem` and solve it.
fn solve_with<P>(problem: P, constraints: Vec<Constraint>) -> Result<P::Solution, ResolutionError>
where
    P: SolverModel<Error = ResolutionError>,
{
    constraints
        .into_iter()
        .fold(problem, |problem, c| problem.with(c))
        .solve()
}

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use good_lp::Solution as LpSolution;
use good_lp::solvers::coin_cbc::{CoinCbcProblem, coin_cbc};
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, SolutionStatus, SolverModel,
    Variable, WithTimeLimit, constraint, variable, variables,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SolverError;
use crate::model::{Comparison, LinearConstraint, LinearExpr, MilpModel, VarKey, VarKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    /// A solution was found but not proven optimal, e.g. the time limit ran out.
    Feasible,
    Infeasible,
    Unbounded,
    Error,
}

/// What a solver hands back: a status and, when there is a solution, the value of every variable.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub values: BTreeMap<VarKey, f64>,
    pub objective_value: Option<f64>,
}

impl SolveResult {
    pub fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            values: BTreeMap::new(),
            objective_value: None,
        }
    }
}

/// An external MILP solver. Always minimises.
pub trait Solver {
    fn solve(&self, model: &MilpModel) -> Result<SolveResult, SolverError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOptions {
    /// Wall-clock limit handed to the solver.
    pub time_limit: Option<Duration>,
    /// Let the solver print its own log.
    pub verbose: bool,
}

/// COIN-OR CBC through `good_lp`.
#[derive(Debug, Clone, Default)]
pub struct CbcSolver {
    options: SolverOptions,
}

impl CbcSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    fn configure(&self, mut model: CoinCbcProblem) -> CoinCbcProblem {
        model.set_parameter("loglevel", if self.options.verbose { "1" } else { "0" });
        match self.options.time_limit {
            Some(limit) => model.with_time_limit(limit.as_secs_f64()),
            None => model,
        }
    }
}

/// CBC stops early on its time or gap limit; whatever it holds then is at best feasible.
fn status_of(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::TimeLimit | SolutionStatus::GapLimit => SolveStatus::Feasible,
    }
}

impl Solver for CbcSolver {
    fn solve(&self, model: &MilpModel) -> Result<SolveResult, SolverError> {
        let (variables, handles) = init_variables(model);
        let objective = create_expression(model.objective(), &handles);

        let cbc = self.configure(variables.minimise(objective).using(coin_cbc));
        let cbc = model
            .constraints()
            .iter()
            .fold(cbc, |m, c| m.with(create_constraint(c, &handles)));

        info!(
            variables = handles.len(),
            constraints = model.constraints().len(),
            "solving with CBC"
        );
        let started = Instant::now();
        let outcome = cbc.solve();
        let elapsed = started.elapsed();
        debug!(?elapsed, "CBC returned");

        match outcome {
            Ok(solution) => {
                let values: BTreeMap<VarKey, f64> = handles
                    .iter()
                    .map(|(key, &var)| (key.clone(), solution.value(var)))
                    .collect();
                let status = status_of(solution.status());
                Ok(SolveResult {
                    status,
                    objective_value: Some(model.objective().evaluate(&values)),
                    values,
                })
            }
            Err(ResolutionError::Infeasible) => {
                Ok(SolveResult::without_solution(SolveStatus::Infeasible))
            }
            Err(ResolutionError::Unbounded) => {
                Ok(SolveResult::without_solution(SolveStatus::Unbounded))
            }
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }
}

type VariableHandles = BTreeMap<VarKey, Variable>;

fn init_variables(model: &MilpModel) -> (ProblemVariables, VariableHandles) {
    let mut problem_vars = variables!();
    let handles = model
        .variables()
        .iter()
        .map(|def| {
            let definition = match def.kind {
                VarKind::Binary => variable().binary(),
                VarKind::NonNegativeInteger => variable().integer().min(0),
            };
            let var = problem_vars.add(definition.name(def.key.to_string()));
            (def.key.clone(), var)
        })
        .collect();
    (problem_vars, handles)
}

fn create_expression(expr: &LinearExpr, handles: &VariableHandles) -> Expression {
    expr.terms
        .iter()
        .fold(Expression::from(0.0), |sum, (key, coefficient)| {
            sum + handles[key] * *coefficient
        })
}

fn create_constraint(c: &LinearConstraint, handles: &VariableHandles) -> Constraint {
    let lhs = create_expression(&c.lhs, handles);
    let rhs = c.rhs;
    match c.cmp {
        Comparison::Eq => constraint!(lhs == rhs),
        Comparison::Leq => constraint!(lhs <= rhs),
        Comparison::Geq => constraint!(lhs >= rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupSpec, Problem, ResourceSpec, TaskSpec};

    fn two_by_two(capacity: f64) -> Problem {
        let mut problem = Problem::default();
        problem.tasks.insert("t1".into(), TaskSpec::new(3.0));
        problem.tasks.insert("t2".into(), TaskSpec::new(2.0));
        problem
            .resources
            .insert("r1".into(), ResourceSpec::new(10.0, capacity, ["t1", "t2"]));
        problem
            .resources
            .insert("r2".into(), ResourceSpec::new(20.0, capacity, ["t1", "t2"]));
        problem
            .groups
            .insert("g".into(), GroupSpec::new(1, 2, ["r1", "r2"]));
        problem
    }

    #[test]
    fn solves_to_optimality() {
        let model = MilpModel::build(&two_by_two(8.0)).unwrap();
        let result = CbcSolver::default().solve(&model).unwrap();

        assert_eq!(result.status, SolveStatus::Optimal);
        let objective = result.objective_value.unwrap();
        assert!((objective - 50.0).abs() < 1e-6, "objective = {objective}");
        assert!(result.values[&VarKey::assign("r1", "t1")] > 0.5);
        assert!(result.values[&VarKey::assign("r1", "t2")] > 0.5);
        assert!((result.values[&VarKey::group_count("g")] - 2.0).abs() < 1e-6);
        assert!(
            model
                .constraints()
                .iter()
                .all(|c| c.is_satisfied(&result.values, 1e-6))
        );
    }

    #[test]
    fn reports_infeasibility_as_status() {
        let model = MilpModel::build(&two_by_two(1.0)).unwrap();
        let result = CbcSolver::default().solve(&model).unwrap();
        assert_eq!(result, SolveResult::without_solution(SolveStatus::Infeasible));
    }

    #[test]
    fn maps_backend_status() {
        assert_eq!(status_of(SolutionStatus::Optimal), SolveStatus::Optimal);
        assert_eq!(status_of(SolutionStatus::TimeLimit), SolveStatus::Feasible);
        assert_eq!(status_of(SolutionStatus::GapLimit), SolveStatus::Feasible);
    }

    #[test]
    fn generous_time_limit_still_proves_optimality() {
        let options = SolverOptions {
            time_limit: Some(Duration::from_secs(60)),
            verbose: false,
        };
        let model = MilpModel::build(&two_by_two(8.0)).unwrap();
        let result = CbcSolver::new(options).solve(&model).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
    }
}

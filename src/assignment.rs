use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, SolverError};
use crate::model::{MilpModel, VarKey};
use crate::solver::{CbcSolver, SolveResult, SolveStatus, Solver, SolverOptions};
use crate::types::Problem;

/// Values above this count as "selected"; solvers return binaries with some noise.
const SELECTION_THRESHOLD: f64 = 0.5;

/// Slack allowed when re-checking capacities against the extracted assignment.
const CAPACITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Optimal,
    Feasible,
    Infeasible,
}

/// Result of a solve that reached the solver and got a usable answer back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    #[serde(skip)]
    pub stats: SolveStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "totalCost")]
    pub total_cost: f64,
    /// Task → resource.
    pub tasks: BTreeMap<String, String>,
    /// Group → number of tasks its members perform (y_g).
    #[serde(rename = "groupTaskCounts", default)]
    pub group_task_counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStats {
    pub build_time: Duration,
    pub solve_time: Duration,
    pub variables: usize,
    pub constraints: usize,
}

impl Problem {
    /// Build, solve with CBC and extract.
    pub fn solve(&self, options: &SolverOptions) -> Result<Outcome, Error> {
        solve_with(self, &CbcSolver::new(options.clone()))
    }
}

pub fn solve_with(problem: &Problem, solver: &impl Solver) -> Result<Outcome, Error> {
    let started = Instant::now();
    let model = MilpModel::build(problem)?;
    let build_time = started.elapsed();

    let started = Instant::now();
    let result = solver.solve(&model)?;
    let solve_time = started.elapsed();

    let stats = SolveStats {
        build_time,
        solve_time,
        variables: model.variables().len(),
        constraints: model.constraints().len(),
    };
    info!(status = ?result.status, ?build_time, ?solve_time, "solve finished");

    let status = match result.status {
        SolveStatus::Optimal => Status::Optimal,
        SolveStatus::Feasible => Status::Feasible,
        SolveStatus::Infeasible => {
            return Ok(Outcome {
                status: Status::Infeasible,
                assignment: None,
                stats,
            });
        }
        SolveStatus::Unbounded => return Err(SolverError::Unbounded.into()),
        SolveStatus::Error => return Err(SolverError::Status(result.status).into()),
    };

    let assignment = create_assignment(problem, &model, &result)
        .and_then(|assignment| assignment.verify(problem).map(|()| assignment))
        .map_err(|e| match (status, e) {
            // An early stop leaves whatever the solver last held, not an incumbent.
            (Status::Feasible, SolverError::InvalidSolution(msg)) => {
                SolverError::StoppedWithoutSolution(msg)
            }
            (_, e) => e,
        })?;

    Ok(Outcome {
        status,
        assignment: Some(assignment),
        stats,
    })
}

/// Turn solver values into a task → resource map, refusing anything partial.
fn create_assignment(
    problem: &Problem,
    model: &MilpModel,
    result: &SolveResult,
) -> Result<Assignment, SolverError> {
    let is_selected = |resource: &str, task: &str| {
        result
            .values
            .get(&VarKey::assign(resource, task))
            .is_some_and(|&v| v > SELECTION_THRESHOLD)
    };

    let mut tasks = BTreeMap::new();
    let mut total_cost = 0.0;
    for task in problem.tasks.keys() {
        let selected: Vec<&str> = problem
            .eligible_resources(task)
            .filter(|resource| is_selected(resource, task))
            .collect();
        let [resource] = selected[..] else {
            return Err(SolverError::InvalidSolution(format!(
                "task {task} is assigned to {} resources",
                selected.len()
            )));
        };
        total_cost += model.cost(resource, task).unwrap_or_default();
        tasks.insert(task.clone(), resource.to_owned());
    }

    let group_task_counts = problem
        .groups
        .keys()
        .map(|group| {
            let value = result
                .values
                .get(&VarKey::group_count(group.as_str()))
                .copied()
                .ok_or_else(|| {
                    SolverError::InvalidSolution(format!("no value for group {group}"))
                })?;
            Ok((group.clone(), value.round().max(0.0) as u32))
        })
        .collect::<Result<_, SolverError>>()?;

    Ok(Assignment {
        total_cost,
        tasks,
        group_task_counts,
    })
}

impl Assignment {
    /// Hours each resource works under this assignment.
    pub fn hours_by_resource(&self, problem: &Problem) -> BTreeMap<String, f64> {
        let mut hours = BTreeMap::new();
        for (task, resource) in &self.tasks {
            let task_hours = problem.tasks.get(task).map_or(0.0, |t| t.hours);
            *hours.entry(resource.clone()).or_insert(0.0) += task_hours;
        }
        hours
    }

    /// Check the assignment against every constraint of `problem`.
    pub fn verify(&self, problem: &Problem) -> Result<(), SolverError> {
        let invalid = |msg: String| Err(SolverError::InvalidSolution(msg));

        for task in problem.tasks.keys() {
            let Some(resource) = self.tasks.get(task) else {
                return invalid(format!("task {task} is unassigned"));
            };
            let eligible = problem
                .resources
                .get(resource)
                .is_some_and(|r| r.can_perform.contains(task));
            if !eligible {
                return invalid(format!("resource {resource} cannot perform task {task}"));
            }
        }

        for (resource, worked) in self.hours_by_resource(problem) {
            let Some(spec) = problem.resources.get(&resource) else {
                return invalid(format!("unknown resource {resource}"));
            };
            let capacity = spec.max_hours_per_day;
            if worked > capacity + CAPACITY_TOLERANCE {
                return invalid(format!(
                    "resource {resource} works {worked} hours, capacity is {capacity}"
                ));
            }
        }

        for (group, spec) in &problem.groups {
            let counted = self
                .tasks
                .values()
                .filter(|resource| spec.members.contains(*resource))
                .count() as u32;
            let reported = self.group_task_counts.get(group).copied().unwrap_or(0);
            if counted != reported {
                return invalid(format!(
                    "group {group} reports {reported} tasks but its members perform {counted}"
                ));
            }
            if !(spec.min_tasks..=spec.max_tasks).contains(&counted) {
                return invalid(format!(
                    "group {group} performs {counted} tasks, bounds are [{}, {}]",
                    spec.min_tasks, spec.max_tasks
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::types::{GroupSpec, ResourceSpec, TaskSpec};
    use std::cell::Cell;

    /// Hands back a canned result and counts how often it was asked.
    struct CannedSolver {
        result: Result<SolveResult, SolverError>,
        calls: Cell<usize>,
    }

    impl CannedSolver {
        fn new(result: Result<SolveResult, SolverError>) -> Self {
            Self {
                result,
                calls: Cell::new(0),
            }
        }

        fn with_values(status: SolveStatus, values: &[(VarKey, f64)]) -> Self {
            Self::new(Ok(SolveResult {
                status,
                values: values.iter().cloned().collect(),
                objective_value: None,
            }))
        }
    }

    impl Solver for CannedSolver {
        fn solve(&self, _model: &MilpModel) -> Result<SolveResult, SolverError> {
            self.calls.set(self.calls.get() + 1);
            self.result.clone()
        }
    }

    fn example() -> Problem {
        let mut problem = Problem::default();
        problem.tasks.insert("t1".into(), TaskSpec::new(3.0));
        problem.tasks.insert("t2".into(), TaskSpec::new(2.0));
        problem
            .resources
            .insert("r1".into(), ResourceSpec::new(10.0, 8.0, ["t1", "t2"]));
        problem
            .resources
            .insert("r2".into(), ResourceSpec::new(20.0, 8.0, ["t1", "t2"]));
        problem
            .groups
            .insert("g".into(), GroupSpec::new(1, 2, ["r1", "r2"]));
        problem
    }

    #[test]
    fn cheaper_resource_takes_both_tasks() {
        let outcome = example().solve(&SolverOptions::default()).unwrap();
        assert_eq!(outcome.status, Status::Optimal);

        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.total_cost, 50.0);
        assert_eq!(assignment.tasks["t1"], "r1");
        assert_eq!(assignment.tasks["t2"], "r1");
        assert_eq!(assignment.group_task_counts["g"], 2);
        assert_eq!(outcome.stats.variables, 5);
        assert_eq!(outcome.stats.constraints, 7);
    }

    #[test]
    fn unreachable_task_never_reaches_the_solver() {
        let mut problem = example();
        problem.tasks.insert("t3".into(), TaskSpec::new(1.0));
        let solver = CannedSolver::new(Err(SolverError::Backend("unused".into())));

        let err = solve_with(&problem, &solver).unwrap_err();
        assert_eq!(
            err,
            Error::Data(DataError::NoEligibleResource { task: "t3".into() })
        );
        assert_eq!(solver.calls.get(), 0);
    }

    #[test]
    fn tolerates_numerical_noise() {
        let solver = CannedSolver::with_values(
            SolveStatus::Feasible,
            &[
                (VarKey::assign("r1", "t1"), 0.999_999),
                (VarKey::assign("r1", "t2"), 1e-9),
                (VarKey::assign("r2", "t1"), -1e-9),
                (VarKey::assign("r2", "t2"), 1.000_001),
                (VarKey::group_count("g"), 1.999_999_7),
            ],
        );
        let outcome = solve_with(&example(), &solver).unwrap();
        assert_eq!(outcome.status, Status::Feasible);

        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.tasks["t1"], "r1");
        assert_eq!(assignment.tasks["t2"], "r2");
        assert_eq!(assignment.total_cost, 30.0 + 40.0);
        assert_eq!(assignment.group_task_counts["g"], 2);
    }

    #[test]
    fn early_stop_without_incumbent_is_a_solver_failure() {
        let solver = CannedSolver::with_values(
            SolveStatus::Feasible,
            &[
                (VarKey::assign("r1", "t1"), 0.3),
                (VarKey::assign("r2", "t1"), 0.3),
                (VarKey::assign("r1", "t2"), 0.0),
                (VarKey::assign("r2", "t2"), 0.0),
                (VarKey::group_count("g"), 0.0),
            ],
        );
        assert!(matches!(
            solve_with(&example(), &solver),
            Err(Error::Solver(SolverError::StoppedWithoutSolution(_)))
        ));
    }

    #[test]
    fn infeasible_status_has_no_assignment() {
        let solver = CannedSolver::with_values(SolveStatus::Infeasible, &[]);
        let outcome = solve_with(&example(), &solver).unwrap();
        assert_eq!(outcome.status, Status::Infeasible);
        assert_eq!(outcome.assignment, None);
    }

    #[test]
    fn unbounded_and_error_are_solver_failures() {
        let solver = CannedSolver::with_values(SolveStatus::Unbounded, &[]);
        assert_eq!(
            solve_with(&example(), &solver),
            Err(Error::Solver(SolverError::Unbounded))
        );

        let solver = CannedSolver::with_values(SolveStatus::Error, &[]);
        assert_eq!(
            solve_with(&example(), &solver),
            Err(Error::Solver(SolverError::Status(SolveStatus::Error)))
        );

        let solver = CannedSolver::new(Err(SolverError::Backend("crashed".into())));
        assert_eq!(
            solve_with(&example(), &solver),
            Err(Error::Solver(SolverError::Backend("crashed".into())))
        );
    }

    #[test]
    fn refuses_partial_or_doubled_assignments() {
        let partial = CannedSolver::with_values(
            SolveStatus::Optimal,
            &[
                (VarKey::assign("r1", "t1"), 1.0),
                (VarKey::group_count("g"), 1.0),
            ],
        );
        assert!(matches!(
            solve_with(&example(), &partial),
            Err(Error::Solver(SolverError::InvalidSolution(_)))
        ));

        let doubled = CannedSolver::with_values(
            SolveStatus::Optimal,
            &[
                (VarKey::assign("r1", "t1"), 1.0),
                (VarKey::assign("r2", "t1"), 1.0),
                (VarKey::assign("r1", "t2"), 1.0),
                (VarKey::group_count("g"), 3.0),
            ],
        );
        assert!(matches!(
            solve_with(&example(), &doubled),
            Err(Error::Solver(SolverError::InvalidSolution(_)))
        ));
    }

    #[test]
    fn rejects_group_count_that_disagrees_with_assignment() {
        let solver = CannedSolver::with_values(
            SolveStatus::Optimal,
            &[
                (VarKey::assign("r1", "t1"), 1.0),
                (VarKey::assign("r1", "t2"), 1.0),
                (VarKey::group_count("g"), 1.0),
            ],
        );
        assert!(matches!(
            solve_with(&example(), &solver),
            Err(Error::Solver(SolverError::InvalidSolution(_)))
        ));
    }

    #[test]
    fn verify_catches_capacity_overrun() {
        let mut problem = example();
        problem.resources.get_mut("r1").unwrap().max_hours_per_day = 4.0;
        let assignment = Assignment {
            total_cost: 50.0,
            tasks: [("t1", "r1"), ("t2", "r1")]
                .into_iter()
                .map(|(t, r)| (t.to_owned(), r.to_owned()))
                .collect(),
            group_task_counts: [("g".to_owned(), 2)].into(),
        };
        assert!(assignment.verify(&problem).is_err());
        assert_eq!(assignment.hours_by_resource(&problem)["r1"], 5.0);
    }

    #[test]
    fn outcome_serializes_without_stats() {
        let outcome = example().solve(&SolverOptions::default()).unwrap();
        let yaml = serde_yaml::to_string(&outcome).unwrap();
        assert!(yaml.starts_with("status: optimal"));
        assert!(yaml.contains("totalCost: 50.0"));
        assert!(!yaml.contains("stats"));

        let infeasible = Outcome {
            status: Status::Infeasible,
            assignment: None,
            stats: SolveStats::default(),
        };
        assert_eq!(
            serde_yaml::to_string(&infeasible).unwrap().trim(),
            "status: infeasible"
        );
    }
}

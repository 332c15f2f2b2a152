use thiserror::Error;

use crate::solver::SolveStatus;

/// Invalid or inconsistent input. Always raised before the solver is involved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("Resource {resource} can perform unknown task {task}")]
    UnknownTask { resource: String, task: String },
    #[error("{owner} references unknown resource {resource}")]
    UnknownResource { owner: String, resource: String },
    #[error("{field} of {id} must be non-negative (found {value})")]
    Negative {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("{field} of {id} must be finite (found {value})")]
    NotFinite {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("Group {group} has minTasks={min} greater than maxTasks={max}")]
    GroupBoundsInverted { group: String, min: u32, max: u32 },
    #[error(
        "Eligibility of task {task} and resource {resource} disagree (task lists resource: {listed_by_task}, resource lists task: {listed_by_resource})"
    )]
    InconsistentEligibility {
        task: String,
        resource: String,
        listed_by_task: bool,
        listed_by_resource: bool,
    },
    #[error("Task {task} has no resource that can perform it")]
    NoEligibleResource { task: String },
}

/// The solver could not deliver a usable answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Objective is unbounded")]
    Unbounded,
    #[error("Solver returned unusable status {0:?}")]
    Status(SolveStatus),
    #[error("Solver stopped at its limit before finding a solution ({0})")]
    StoppedWithoutSolution(String),
    #[error("Solver failed: {0}")]
    Backend(String),
    #[error("Solver returned an invalid solution: {0}")]
    InvalidSolution(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

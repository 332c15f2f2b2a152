mod assignment;
mod error;
mod lp;
mod model;
mod solver;
mod types;
mod validate;

pub use assignment::{Assignment, Outcome, SolveStats, Status, solve_with};
pub use error::{DataError, Error, SolverError};
pub use lp::write_lp;
pub use model::{Comparison, LinearConstraint, LinearExpr, MilpModel, VarKey, VarKind, VariableDef};
pub use solver::{CbcSolver, SolveResult, SolveStatus, Solver, SolverOptions};
pub use types::{GroupSpec, Problem, ResourceSpec, TaskSpec};

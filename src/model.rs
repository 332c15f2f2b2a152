//! Solver-agnostic MILP model of the assignment problem.
//!
//! The model is plain data: variables, named linear constraints and a linear
//! objective to minimise. A [`Solver`](crate::Solver) turns it into
//! whatever its backend needs.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::DataError;
use crate::types::Problem;

/// Identifies a decision variable by what it means in the problem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarKey {
    /// x_rt: resource `resource` performs task `task`.
    Assign { resource: String, task: String },
    /// y_g: number of tasks handled by the members of a group.
    GroupCount(String),
}

impl VarKey {
    pub fn assign(resource: impl Into<String>, task: impl Into<String>) -> Self {
        VarKey::Assign {
            resource: resource.into(),
            task: task.into(),
        }
    }

    pub fn group_count(group: impl Into<String>) -> Self {
        VarKey::GroupCount(group.into())
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKey::Assign { resource, task } => write!(f, "x[{resource},{task}]"),
            VarKey::GroupCount(group) => write!(f, "y[{group}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    /// Integer with a lower bound of zero and no upper bound.
    NonNegativeInteger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub key: VarKey,
    pub kind: VarKind,
}

/// Sum of `coefficient * variable` terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarKey, f64)>,
}

impl LinearExpr {
    pub fn add(&mut self, key: VarKey, coefficient: f64) {
        self.terms.push((key, coefficient));
    }

    pub fn coefficient(&self, key: &VarKey) -> f64 {
        self.terms
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, c)| c)
            .sum()
    }

    /// Value of the expression under `values`; missing variables count as zero.
    pub fn evaluate(&self, values: &BTreeMap<VarKey, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(key, c)| c * values.get(key).copied().unwrap_or(0.0))
            .sum()
    }
}

impl FromIterator<(VarKey, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarKey, f64)>>(iter: I) -> Self {
        LinearExpr {
            terms: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Leq,
    Geq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub lhs: LinearExpr,
    pub cmp: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    fn new(name: String, lhs: LinearExpr, cmp: Comparison, rhs: f64) -> Self {
        Self {
            name,
            lhs,
            cmp,
            rhs,
        }
    }

    /// Whether `values` satisfy the constraint within `tolerance`.
    pub fn is_satisfied(&self, values: &BTreeMap<VarKey, f64>, tolerance: f64) -> bool {
        let lhs = self.lhs.evaluate(values);
        match self.cmp {
            Comparison::Eq => (lhs - self.rhs).abs() <= tolerance,
            Comparison::Leq => lhs <= self.rhs + tolerance,
            Comparison::Geq => lhs >= self.rhs - tolerance,
        }
    }
}

/// Name of a constraint or variable built from a family name and its index.
fn namer(family: &str, index: &[&str]) -> String {
    format!("{family}[{}]", index.join(","))
}

type AssignmentCosts = BTreeMap<(String, String), f64>;

/// A fully built minimisation model.
#[derive(Debug, Clone, PartialEq)]
pub struct MilpModel {
    variables: Vec<VariableDef>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
    costs: AssignmentCosts,
}

impl MilpModel {
    /// Validate `problem` and build its model.
    pub fn build(problem: &Problem) -> Result<Self, DataError> {
        problem.validate()?;

        let costs = compute_assignment_costs(problem);
        let variables = init_variables(problem);
        let objective = create_objective_function(&costs);

        let mut constraints = Vec::new();
        constrain_each_task_assigned_once(problem, &mut constraints);
        constrain_resource_capacities(problem, &mut constraints);
        constrain_group_task_counts(problem, &mut constraints);
        constrain_group_bounds(problem, &mut constraints);

        debug!(
            variables = variables.len(),
            constraints = constraints.len(),
            "built assignment model"
        );

        Ok(MilpModel {
            variables,
            constraints,
            objective,
            costs,
        })
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// θ_rt for an eligible pair, `None` when the pair is not admissible.
    pub fn cost(&self, resource: &str, task: &str) -> Option<f64> {
        self.costs
            .get(&(resource.to_owned(), task.to_owned()))
            .copied()
    }

    pub fn costs(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.costs
            .iter()
            .map(|((r, t), &c)| (r.as_str(), t.as_str(), c))
    }

    pub fn assignment_variable_count(&self) -> usize {
        self.costs.len()
    }
}

/// θ_rt = η_t · λ_r, once per eligible pair.
fn compute_assignment_costs(problem: &Problem) -> AssignmentCosts {
    problem
        .eligible_pairs()
        .map(|(resource, task)| {
            let hours = problem.tasks[task].hours;
            let rate = problem.resources[resource].cost_per_hour;
            ((resource.to_owned(), task.to_owned()), hours * rate)
        })
        .collect()
}

fn init_variables(problem: &Problem) -> Vec<VariableDef> {
    let assignments = problem
        .eligible_pairs()
        .map(|(resource, task)| VariableDef {
            key: VarKey::assign(resource, task),
            kind: VarKind::Binary,
        });
    let group_counts = problem.groups.keys().map(|group| VariableDef {
        key: VarKey::group_count(group.as_str()),
        kind: VarKind::NonNegativeInteger,
    });
    assignments.chain(group_counts).collect()
}

fn create_objective_function(costs: &AssignmentCosts) -> LinearExpr {
    costs
        .iter()
        .map(|((resource, task), &theta)| (VarKey::assign(resource.as_str(), task.as_str()), theta))
        .collect()
}

fn constrain_each_task_assigned_once(problem: &Problem, constraints: &mut Vec<LinearConstraint>) {
    let before = constraints.len();
    for task in problem.tasks.keys() {
        let lhs = problem
            .eligible_resources(task)
            .map(|resource| (VarKey::assign(resource, task.as_str()), 1.0))
            .collect();
        constraints.push(LinearConstraint::new(
            namer("assign", &[task.as_str()]),
            lhs,
            Comparison::Eq,
            1.0,
        ));
    }
    debug!(count = constraints.len() - before, "added task assignment constraints");
}

fn constrain_resource_capacities(problem: &Problem, constraints: &mut Vec<LinearConstraint>) {
    let before = constraints.len();
    for (resource, spec) in &problem.resources {
        let lhs = spec
            .can_perform
            .iter()
            .filter_map(|task| problem.tasks.get(task).map(|t| (task, t.hours)))
            .map(|(task, hours)| (VarKey::assign(resource.as_str(), task.as_str()), hours))
            .collect();
        constraints.push(LinearConstraint::new(
            namer("capacity", &[resource.as_str()]),
            lhs,
            Comparison::Leq,
            spec.max_hours_per_day,
        ));
    }
    debug!(count = constraints.len() - before, "added resource capacity constraints");
}

/// y_g = Σ_{r ∈ members} Σ_{t ∈ canPerform(r)} x_rt, written as y_g - Σ x_rt = 0.
fn constrain_group_task_counts(problem: &Problem, constraints: &mut Vec<LinearConstraint>) {
    let before = constraints.len();
    for (group, spec) in &problem.groups {
        let mut lhs = LinearExpr::default();
        lhs.add(VarKey::group_count(group.as_str()), 1.0);
        for resource in &spec.members {
            let Some(resource_spec) = problem.resources.get(resource) else {
                continue;
            };
            for task in resource_spec
                .can_perform
                .iter()
                .filter(|task| problem.tasks.contains_key(*task))
            {
                lhs.add(VarKey::assign(resource.as_str(), task.as_str()), -1.0);
            }
        }
        constraints.push(LinearConstraint::new(
            namer("group_count", &[group.as_str()]),
            lhs,
            Comparison::Eq,
            0.0,
        ));
    }
    debug!(count = constraints.len() - before, "added group task count constraints");
}

fn constrain_group_bounds(problem: &Problem, constraints: &mut Vec<LinearConstraint>) {
    let before = constraints.len();
    for (group, spec) in &problem.groups {
        let y = || LinearExpr::from_iter([(VarKey::group_count(group.as_str()), 1.0)]);
        constraints.push(LinearConstraint::new(
            namer("group_min", &[group.as_str()]),
            y(),
            Comparison::Geq,
            f64::from(spec.min_tasks),
        ));
        constraints.push(LinearConstraint::new(
            namer("group_max", &[group.as_str()]),
            y(),
            Comparison::Leq,
            f64::from(spec.max_tasks),
        ));
    }
    debug!(count = constraints.len() - before, "added group bound constraints");
}

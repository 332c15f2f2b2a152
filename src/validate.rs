use tracing::warn;

use crate::error::DataError;
use crate::types::Problem;

impl Problem {
    /// Check the input and fail on the first problem found.
    pub fn validate(&self) -> Result<(), DataError> {
        match self.issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => {
                self.warn_on_capacity_shortfall();
                Ok(())
            }
        }
    }

    /// Every problem with the input, in a stable order.
    pub fn issues(&self) -> Vec<DataError> {
        let mut issues = Vec::new();
        collect_unknown_references(self, &mut issues);
        collect_bad_parameters(self, &mut issues);
        collect_inverted_group_bounds(self, &mut issues);
        collect_inconsistent_eligibility(self, &mut issues);
        collect_unreachable_tasks(self, &mut issues);
        issues
    }

    fn warn_on_capacity_shortfall(&self) {
        let demand = self.total_task_hours();
        let capacity = self.total_capacity();
        if demand > capacity {
            warn!(
                demand,
                capacity, "total task hours exceed total resource capacity, model will be infeasible"
            );
        }
    }
}

fn collect_unknown_references(problem: &Problem, issues: &mut Vec<DataError>) {
    for (resource, spec) in &problem.resources {
        for task in spec.can_perform.iter() {
            if !problem.tasks.contains_key(task) {
                issues.push(DataError::UnknownTask {
                    resource: resource.clone(),
                    task: task.clone(),
                });
            }
        }
    }

    let task_refs = problem
        .tasks
        .iter()
        .filter_map(|(task, spec)| spec.resources.as_ref().map(|rs| (task, rs)));
    let group_refs = problem.groups.iter().map(|(group, spec)| (group, &spec.members));

    for (owner, resources) in task_refs.chain(group_refs) {
        for resource in resources {
            if !problem.resources.contains_key(resource) {
                issues.push(DataError::UnknownResource {
                    owner: owner.clone(),
                    resource: resource.clone(),
                });
            }
        }
    }
}

fn collect_bad_parameters(problem: &Problem, issues: &mut Vec<DataError>) {
    let task_params = problem
        .tasks
        .iter()
        .map(|(id, spec)| (id, "hours", spec.hours));
    let resource_params = problem.resources.iter().flat_map(|(id, spec)| {
        [
            (id, "costPerHour", spec.cost_per_hour),
            (id, "maxHoursPerDay", spec.max_hours_per_day),
        ]
    });

    for (id, field, value) in task_params.chain(resource_params) {
        if !value.is_finite() {
            issues.push(DataError::NotFinite {
                id: id.clone(),
                field,
                value,
            });
        } else if value < 0.0 {
            issues.push(DataError::Negative {
                id: id.clone(),
                field,
                value,
            });
        }
    }
}

fn collect_inverted_group_bounds(problem: &Problem, issues: &mut Vec<DataError>) {
    for (group, spec) in &problem.groups {
        if spec.min_tasks > spec.max_tasks {
            issues.push(DataError::GroupBoundsInverted {
                group: group.clone(),
                min: spec.min_tasks,
                max: spec.max_tasks,
            });
        }
    }
}

/// r ∈ 𝒫_t ⟺ t ∈ 𝒬_r, for tasks that state 𝒫_t explicitly.
fn collect_inconsistent_eligibility(problem: &Problem, issues: &mut Vec<DataError>) {
    for (task, spec) in &problem.tasks {
        let Some(listed) = &spec.resources else {
            continue;
        };
        for (resource, resource_spec) in &problem.resources {
            let listed_by_task = listed.contains(resource);
            let listed_by_resource = resource_spec.can_perform.contains(task);
            if listed_by_task != listed_by_resource {
                issues.push(DataError::InconsistentEligibility {
                    task: task.clone(),
                    resource: resource.clone(),
                    listed_by_task,
                    listed_by_resource,
                });
            }
        }
    }
}

fn collect_unreachable_tasks(problem: &Problem, issues: &mut Vec<DataError>) {
    for task in problem.tasks.keys() {
        if problem.eligible_resources(task).next().is_none() {
            issues.push(DataError::NoEligibleResource { task: task.clone() });
        }
    }
}

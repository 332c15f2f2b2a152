use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sets and parameters of one assignment instance, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub tasks: BTreeMap<String, TaskSpec>,
    pub resources: BTreeMap<String, ResourceSpec>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub hours: f64,
    /// Resources allowed to perform this task. Derived from `canPerform` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "costPerHour")]
    pub cost_per_hour: f64,
    #[serde(rename = "maxHoursPerDay")]
    pub max_hours_per_day: f64,
    #[serde(rename = "canPerform", default)]
    pub can_perform: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(rename = "minTasks", default)]
    pub min_tasks: u32,
    #[serde(rename = "maxTasks")]
    pub max_tasks: u32,
    #[serde(default)]
    pub members: BTreeSet<String>,
}

impl TaskSpec {
    pub fn new(hours: f64) -> Self {
        Self {
            hours,
            resources: None,
        }
    }
}

impl ResourceSpec {
    pub fn new<I, S>(cost_per_hour: f64, max_hours_per_day: f64, can_perform: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cost_per_hour,
            max_hours_per_day,
            can_perform: can_perform.into_iter().map(Into::into).collect(),
        }
    }
}

impl GroupSpec {
    pub fn new<I, S>(min_tasks: u32, max_tasks: u32, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            min_tasks,
            max_tasks,
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

impl Problem {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Resources eligible for `task` (𝒫_t), as seen from the resource side.
    pub fn eligible_resources<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .iter()
            .filter(move |(_, spec)| spec.can_perform.contains(task))
            .map(|(resource, _)| resource.as_str())
    }

    /// Every admissible (resource, task) pair, in resource-then-task order.
    ///
    /// References to unknown tasks are skipped; validation reports them.
    pub fn eligible_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resources.iter().flat_map(move |(resource, spec)| {
            spec.can_perform
                .iter()
                .filter(move |task| self.tasks.contains_key(*task))
                .map(move |task| (resource.as_str(), task.as_str()))
        })
    }

    pub fn total_task_hours(&self) -> f64 {
        self.tasks.values().map(|t| t.hours).sum()
    }

    pub fn total_capacity(&self) -> f64 {
        self.resources.values().map(|r| r.max_hours_per_day).sum()
    }
}

//! Task plans.
//!
//! A plan is a named batch of demo tasks. Each task sleeps for a while and
//! then succeeds, fails or panics, which is enough to exercise every path
//! through a coordinator from the command line.
//!
//! # Example
//!
//! ```json
//! {
//!   "name": "three-sleepers",
//!   "deadline_ms": 5000,
//!   "tasks": [
//!     { "name": "slow", "sleep_ms": 30 },
//!     { "name": "fast", "sleep_ms": 10, "behavior": { "type": "succeed", "value": "hi" } },
//!     { "name": "broken", "sleep_ms": 20, "behavior": { "type": "fail", "message": "boom" } }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;
use crate::error::ConfigError;

/// What a planned task does once its sleep is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskBehavior {
  /// Return `value`, or the task's index in the plan when unset.
  Succeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
  },
  /// Return an error carrying `message`.
  Fail { message: String },
  /// Panic with `message`.
  Panic { message: String },
}

impl Default for TaskBehavior {
  fn default() -> Self {
    Self::Succeed { value: None }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
  pub name: String,
  #[serde(default)]
  pub sleep_ms: u64,
  #[serde(default)]
  pub behavior: TaskBehavior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDef {
  pub name: String,
  #[serde(flatten)]
  pub coordinator: CoordinatorConfig,
  #[serde(default)]
  pub tasks: Vec<TaskDef>,
}

impl PlanDef {
  /// Parse and validate a plan from a JSON document.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let plan: PlanDef = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
      message: e.to_string(),
    })?;
    plan.validate()?;
    Ok(plan)
  }

  /// Check that the plan can be submitted as one batch.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.trim().is_empty() {
      return Err(ConfigError::invalid("plan name must not be empty"));
    }

    let mut seen = HashSet::new();
    for (index, task) in self.tasks.iter().enumerate() {
      if task.name.trim().is_empty() {
        return Err(ConfigError::invalid(format!(
          "task at index {} has an empty name",
          index
        )));
      }
      if !seen.insert(task.name.as_str()) {
        return Err(ConfigError::invalid(format!(
          "duplicate task name '{}'",
          task.name
        )));
      }
    }

    if let Some(limit) = self.coordinator.max_tasks {
      if self.tasks.len() > limit {
        return Err(ConfigError::invalid(format!(
          "plan has {} tasks but max_tasks is {}",
          self.tasks.len(),
          limit
        )));
      }
    }

    Ok(())
  }
}

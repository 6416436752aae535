use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_wait_ms() -> u64 {
  1000
}

/// Settings for a fan-in coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
  /// Overall deadline in milliseconds, measured from coordinator creation.
  /// No wait ever extends past it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deadline_ms: Option<u64>,

  /// Default per-wait timeout in milliseconds.
  #[serde(default = "default_wait_ms")]
  pub wait_ms: u64,

  /// Maximum number of tasks a coordinator accepts.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_tasks: Option<usize>,
}

impl CoordinatorConfig {
  pub fn deadline(&self) -> Option<Duration> {
    self.deadline_ms.map(Duration::from_millis)
  }

  pub fn wait(&self) -> Duration {
    Duration::from_millis(self.wait_ms)
  }

  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline_ms = Some(u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX));
    self
  }

  pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
    self.max_tasks = Some(max_tasks);
    self
  }
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      deadline_ms: None,
      wait_ms: default_wait_ms(),
      max_tasks: None,
    }
  }
}

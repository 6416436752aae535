//! Task results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Identifier the coordinator assigns to a task at submission.
///
/// Ids are handed out in submission order starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
  pub(crate) fn new(index: u64) -> Self {
    Self(index)
  }

  /// Position of the task in submission order.
  pub fn index(&self) -> u64 {
    self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "task-{}", self.0)
  }
}

/// The single result of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<T> {
  /// Task that produced this result.
  pub task_id: TaskId,
  /// Name the task was submitted with.
  pub name: String,
  /// Payload on success, failure indicator otherwise.
  pub outcome: Result<T, TaskError>,
  /// How long the work ran, in milliseconds.
  pub elapsed_ms: u64,
}

impl<T> TaskResult<T> {
  /// Result for a task whose conduit closed without a value.
  pub(crate) fn abandoned(task_id: TaskId, name: String) -> Self {
    Self {
      task_id,
      name,
      outcome: Err(TaskError::Abandoned),
      elapsed_ms: 0,
    }
  }

  pub fn is_ok(&self) -> bool {
    self.outcome.is_ok()
  }
}

/// What a wait on the coordinator produced.
#[derive(Debug)]
pub enum Next<T> {
  /// A task finished; its result is handed out exactly once.
  Ready(TaskResult<T>),
  /// The wait elapsed with nothing ready. Waiting again is allowed.
  Timeout,
  /// Every submitted task has already been delivered.
  Drained,
}

impl<T> Next<T> {
  pub fn ready(self) -> Option<TaskResult<T>> {
    match self {
      Next::Ready(result) => Some(result),
      _ => None,
    }
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, Next::Timeout)
  }

  pub fn is_drained(&self) -> bool {
    matches!(self, Next::Drained)
  }
}

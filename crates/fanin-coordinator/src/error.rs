//! Coordinator and task errors.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::result::TaskId;

/// Errors returned by the coordinator itself.
///
/// Task failures never show up here; they are delivered as the failed
/// outcome of that task's [`TaskResult`](crate::TaskResult).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
  /// `submit` was called after draining began.
  #[error("cannot submit tasks after draining has started")]
  AlreadyStarted,

  /// `submit` was called after the coordinator was cancelled.
  #[error("coordinator cancelled")]
  Cancelled,

  /// The configured task bound was reached.
  #[error("coordinator accepts at most {limit} tasks")]
  CapacityExceeded { limit: usize },

  /// A result for this task was already handed out. This is a coordinator bug.
  #[error("result for {task_id} delivered more than once")]
  DoubleDelivery { task_id: TaskId },
}

/// The failed outcome of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TaskError {
  /// The work returned an error.
  #[error("task failed: {message}")]
  Failed { message: String },

  /// The work panicked.
  #[error("task panicked: {message}")]
  Panicked { message: String },

  /// The work observed cancellation and stopped.
  #[error("task cancelled")]
  Cancelled,

  /// The task went away without producing a result.
  #[error("task abandoned without a result")]
  Abandoned,
}

impl TaskError {
  /// Create a failure from any error message.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  /// Build a panic failure from a caught panic payload.
  pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "unknown panic payload".to_string()
    };
    Self::Panicked { message }
  }
}

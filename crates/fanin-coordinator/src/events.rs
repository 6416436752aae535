//! Coordinator events and notifiers for observability.
//!
//! Events are emitted while a batch runs so consumers can observe progress,
//! stream it to a UI, record it, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::result::TaskId;

/// Events emitted by a coordinator and its tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorEvent {
  /// A task was accepted and scheduled.
  TaskSubmitted {
    coordinator_id: String,
    task_id: TaskId,
    name: String,
  },

  /// A task's work finished and its result was written to its conduit.
  ///
  /// Emitted from the task side, so it may arrive before the caller waits.
  TaskFinished {
    coordinator_id: String,
    task_id: TaskId,
    success: bool,
  },

  /// A result was handed to the caller.
  ResultDelivered {
    coordinator_id: String,
    task_id: TaskId,
    success: bool,
  },

  /// A wait elapsed with `pending` tasks still outstanding.
  WaitTimedOut {
    coordinator_id: String,
    pending: usize,
  },

  /// Every result has been delivered.
  Drained {
    coordinator_id: String,
    delivered: usize,
  },

  /// Cancellation was requested.
  Cancelled { coordinator_id: String },
}

/// Trait for receiving coordinator events.
///
/// The coordinator calls `notify` for each event; implementations decide
/// what to do with them.
pub trait CoordinatorNotifier: Send + Sync {
  fn notify(&self, event: CoordinatorEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl CoordinatorNotifier for NoopNotifier {
  fn notify(&self, _event: CoordinatorEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // notify() runs on task threads and must never block.
  sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
    Self { sender }
  }
}

impl CoordinatorNotifier for ChannelNotifier {
  fn notify(&self, event: CoordinatorEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

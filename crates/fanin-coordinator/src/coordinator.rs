//! The fan-in coordinator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fanin_config::CoordinatorConfig;
use futures::stream::{FuturesUnordered, Stream};
use futures::{FutureExt, StreamExt};
use tokio::sync::oneshot::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, info, instrument, warn};

use crate::error::CoordinatorError;
use crate::events::{CoordinatorEvent, CoordinatorNotifier, NoopNotifier};
use crate::result::{Next, TaskId, TaskResult};
use crate::task::{Conduit, Task};

/// Roughly thirty years; stands in for "no timeout" without overflowing.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Results collected by [`Coordinator::drain`].
#[derive(Debug)]
pub struct DrainReport<T> {
  /// Results in completion order.
  pub results: Vec<TaskResult<T>>,
  /// Whether every task was delivered before the wait ran out.
  pub drained: bool,
}

/// Runs a fixed batch of tasks concurrently and hands out their results in
/// completion order.
///
/// Tasks are submitted first; the first wait closes the batch. Each task
/// writes its single result to a private conduit, and every wait races all
/// outstanding conduits against a deadline. When two conduits become ready
/// at the same time, which one is returned first is unspecified.
///
/// Dropping the coordinator cancels any tasks still running.
pub struct Coordinator<T> {
  id: String,
  config: CoordinatorConfig,
  deadline: Option<Instant>,
  cancel: CancellationToken,
  _cancel_on_drop: DropGuard,
  notifier: Arc<dyn CoordinatorNotifier>,
  pending: FuturesUnordered<Conduit<T>>,
  delivered: HashSet<TaskId>,
  submitted: u64,
  started: bool,
  drain_reported: bool,
}

impl<T: Send + 'static> Coordinator<T> {
  /// Create a coordinator. The overall deadline, if any, starts now.
  pub fn new(config: CoordinatorConfig) -> Self {
    let cancel = CancellationToken::new();
    // A deadline too far out to represent behaves like no deadline.
    let deadline = config.deadline().and_then(|d| Instant::now().checked_add(d));

    Self {
      id: uuid::Uuid::new_v4().to_string(),
      config,
      deadline,
      _cancel_on_drop: cancel.clone().drop_guard(),
      cancel,
      notifier: Arc::new(NoopNotifier),
      pending: FuturesUnordered::new(),
      delivered: HashSet::new(),
      submitted: 0,
      started: false,
      drain_reported: false,
    }
  }

  /// Send coordinator events to `notifier`.
  pub fn with_notifier(mut self, notifier: Arc<dyn CoordinatorNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Unique id of this coordinator, used in log fields and events.
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn config(&self) -> &CoordinatorConfig {
    &self.config
  }

  /// Register a task and start it running.
  ///
  /// Must be called within a tokio runtime.
  ///
  /// # Errors
  /// - [`CoordinatorError::AlreadyStarted`] once any wait has been made.
  /// - [`CoordinatorError::Cancelled`] after [`cancel`](Self::cancel).
  /// - [`CoordinatorError::CapacityExceeded`] when `max_tasks` is reached.
  #[instrument(
    name = "coordinator_submit",
    skip(self, task),
    fields(
      coordinator_id = %self.id,
      task_name = %task.name(),
    )
  )]
  pub fn submit(&mut self, task: Task<T>) -> Result<TaskId, CoordinatorError> {
    if self.started {
      warn!("submit after draining started");
      return Err(CoordinatorError::AlreadyStarted);
    }
    if self.cancel.is_cancelled() {
      warn!("submit after cancellation");
      return Err(CoordinatorError::Cancelled);
    }
    if let Some(limit) = self.config.max_tasks {
      if self.submitted >= limit as u64 {
        warn!(limit, "task limit reached");
        return Err(CoordinatorError::CapacityExceeded { limit });
      }
    }

    let task_id = TaskId::new(self.submitted);
    self.submitted += 1;
    let name = task.name().to_string();

    let conduit = task.spawn(
      task_id,
      self.id.clone(),
      self.cancel.child_token(),
      self.notifier.clone(),
    );
    self.pending.push(conduit);

    info!(task_id = %task_id, "task_submitted");
    self.notifier.notify(CoordinatorEvent::TaskSubmitted {
      coordinator_id: self.id.clone(),
      task_id,
      name,
    });

    Ok(task_id)
  }

  /// Wait for the next task to finish.
  ///
  /// Returns the first result to arrive, [`Next::Timeout`] if `timeout` (or
  /// the overall deadline, whichever is sooner) passes first, or
  /// [`Next::Drained`] when every result has already been delivered.
  pub async fn await_next(&mut self, timeout: Duration) -> Result<Next<T>, CoordinatorError> {
    let until = self.wait_until(timeout);
    self.await_until(until).await
  }

  /// Wait for the next task using the configured `wait_ms`.
  pub async fn await_next_default(&mut self) -> Result<Next<T>, CoordinatorError> {
    self.await_next(self.config.wait()).await
  }

  /// Take a result that is ready right now, without waiting.
  ///
  /// Returns [`Next::Timeout`] when tasks are outstanding but none has
  /// finished, logged and notified the same way as a timed-out wait.
  pub fn try_next(&mut self) -> Result<Next<T>, CoordinatorError> {
    self.started = true;
    if self.pending.is_empty() {
      return Ok(self.drained());
    }

    match self.pending.next().now_or_never() {
      Some(Some((task_id, name, received))) => {
        self.deliver(task_id, name, received).map(Next::Ready)
      }
      Some(None) => Ok(self.drained()),
      None => Ok(self.timed_out()),
    }
  }

  /// Collect results until the batch drains or `timeout` runs out.
  ///
  /// `timeout` bounds the whole call, not each result.
  pub async fn drain(&mut self, timeout: Duration) -> Result<DrainReport<T>, CoordinatorError> {
    let until = self.wait_until(timeout);
    let mut results = Vec::with_capacity(self.pending.len());

    loop {
      match self.await_until(until).await? {
        Next::Ready(result) => results.push(result),
        Next::Timeout => {
          return Ok(DrainReport {
            results,
            drained: false,
          });
        }
        Next::Drained => {
          return Ok(DrainReport {
            results,
            drained: true,
          });
        }
      }
    }
  }

  /// Turn the coordinator into a stream of results in completion order.
  ///
  /// The stream ends once every result has been delivered or the overall
  /// deadline passes. Without a deadline it waits as long as tasks run.
  pub fn into_stream(self) -> impl Stream<Item = Result<TaskResult<T>, CoordinatorError>> {
    futures::stream::unfold(Some(self), |state| async move {
      let mut coordinator = state?;
      match coordinator.await_next(FAR_FUTURE).await {
        Ok(Next::Ready(result)) => Some((Ok(result), Some(coordinator))),
        Ok(Next::Timeout) | Ok(Next::Drained) => None,
        Err(e) => Some((Err(e), None)),
      }
    })
  }

  /// Ask every unfinished task to stop.
  ///
  /// Advisory only: tasks may still finish normally, and every result that
  /// arrives stays retrievable.
  pub fn cancel(&self) {
    if self.cancel.is_cancelled() {
      return;
    }
    info!(
      coordinator_id = %self.id,
      pending = self.pending.len(),
      "coordinator_cancelled"
    );
    self.cancel.cancel();
    self.notifier.notify(CoordinatorEvent::Cancelled {
      coordinator_id: self.id.clone(),
    });
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Number of tasks whose results have not been delivered yet.
  pub fn pending(&self) -> usize {
    self.pending.len()
  }

  /// Number of results delivered so far.
  pub fn delivered(&self) -> usize {
    self.delivered.len()
  }

  pub fn is_drained(&self) -> bool {
    self.started && self.pending.is_empty()
  }

  #[instrument(
    name = "coordinator_await",
    skip(self),
    fields(
      coordinator_id = %self.id,
      pending = self.pending.len(),
    )
  )]
  async fn await_until(&mut self, until: Instant) -> Result<Next<T>, CoordinatorError> {
    self.started = true;
    if self.pending.is_empty() {
      return Ok(self.drained());
    }

    match tokio::time::timeout_at(until, self.pending.next()).await {
      Ok(Some((task_id, name, received))) => {
        self.deliver(task_id, name, received).map(Next::Ready)
      }
      Ok(None) => Ok(self.drained()),
      Err(_) => Ok(self.timed_out()),
    }
  }

  fn timed_out(&self) -> Next<T> {
    warn!(
      coordinator_id = %self.id,
      pending = self.pending.len(),
      "wait_timed_out"
    );
    self.notifier.notify(CoordinatorEvent::WaitTimedOut {
      coordinator_id: self.id.clone(),
      pending: self.pending.len(),
    });
    Next::Timeout
  }

  /// Earliest of `now + timeout` and the overall deadline.
  fn wait_until(&self, timeout: Duration) -> Instant {
    let now = Instant::now();
    let requested = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
    match self.deadline {
      Some(deadline) => requested.min(deadline),
      None => requested,
    }
  }

  /// Hand out a received result, enforcing once-per-task delivery.
  fn deliver(
    &mut self,
    task_id: TaskId,
    name: String,
    received: Result<TaskResult<T>, RecvError>,
  ) -> Result<TaskResult<T>, CoordinatorError> {
    if !self.delivered.insert(task_id) {
      error!(task_id = %task_id, "result delivered twice");
      return Err(CoordinatorError::DoubleDelivery { task_id });
    }

    let result = received.unwrap_or_else(|_| {
      warn!(task_id = %task_id, task_name = %name, "task dropped its conduit without a result");
      TaskResult::abandoned(task_id, name)
    });

    info!(
      task_id = %task_id,
      success = result.is_ok(),
      elapsed_ms = result.elapsed_ms,
      "result_delivered"
    );
    self.notifier.notify(CoordinatorEvent::ResultDelivered {
      coordinator_id: self.id.clone(),
      task_id,
      success: result.is_ok(),
    });

    Ok(result)
  }

  fn drained(&mut self) -> Next<T> {
    if !self.drain_reported {
      self.drain_reported = true;
      info!(
        coordinator_id = %self.id,
        delivered = self.delivered.len(),
        "coordinator_drained"
      );
      self.notifier.notify(CoordinatorEvent::Drained {
        coordinator_id: self.id.clone(),
        delivered: self.delivered.len(),
      });
    }
    Next::Drained
  }
}

//! Tasks and their conduits.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use crate::error::TaskError;
use crate::events::{CoordinatorEvent, CoordinatorNotifier};
use crate::result::{TaskId, TaskResult};

type AsyncWork<T> =
  Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, TaskError>> + Send>;
type BlockingWork<T> = Box<dyn FnOnce(CancellationToken) -> Result<T, TaskError> + Send>;

enum Work<T> {
  Async(AsyncWork<T>),
  Blocking(BlockingWork<T>),
}

/// A unit of work that produces exactly one result.
pub struct Task<T> {
  name: String,
  work: Work<T>,
}

impl<T: Send + 'static> Task<T> {
  /// Create an async task.
  ///
  /// The closure receives a cancellation token. Cancellation is advisory:
  /// the work decides whether and when to stop, typically by returning
  /// [`TaskError::Cancelled`] once the token fires.
  pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
  {
    Self {
      name: name.into(),
      work: Work::Async(Box::new(move |cancel| work(cancel).boxed())),
    }
  }

  /// Create a task from synchronous work, run on the blocking thread pool.
  ///
  /// The closure receives the same advisory cancellation token as async
  /// work; long-running loops should check `is_cancelled()`.
  pub fn blocking<F>(name: impl Into<String>, work: F) -> Self
  where
    F: FnOnce(CancellationToken) -> Result<T, TaskError> + Send + 'static,
  {
    Self {
      name: name.into(),
      work: Work::Blocking(Box::new(work)),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Start the work and return the receiving end of its conduit.
  ///
  /// Must be called within a tokio runtime.
  pub(crate) fn spawn(
    self,
    task_id: TaskId,
    coordinator_id: String,
    cancel: CancellationToken,
    notifier: Arc<dyn CoordinatorNotifier>,
  ) -> Conduit<T> {
    let (sender, receiver) = oneshot::channel();
    let span = info_span!(
      "task_run",
      coordinator_id = %coordinator_id,
      task_id = %task_id,
      task_name = %self.name,
    );
    let writer = ConduitWriter {
      task_id,
      name: self.name.clone(),
      coordinator_id,
      notifier,
      sender,
    };

    match self.work {
      Work::Async(work) => {
        tokio::spawn(
          async move {
            let started = Instant::now();
            // The closure call happens inside the guarded future so a panic
            // while building the future is caught too.
            let outcome = AssertUnwindSafe(async move { work(cancel).await })
              .catch_unwind()
              .await
              .unwrap_or_else(|payload| Err(TaskError::panicked(payload)));
            writer.write(outcome, started);
          }
          .instrument(span),
        );
      }
      Work::Blocking(work) => {
        tokio::task::spawn_blocking(move || {
          let _entered = span.enter();
          let started = Instant::now();
          let outcome = std::panic::catch_unwind(AssertUnwindSafe(move || work(cancel)))
            .unwrap_or_else(|payload| Err(TaskError::panicked(payload)));
          writer.write(outcome, started);
        });
      }
    }

    Conduit::new(task_id, self.name, receiver)
  }
}

/// Writing end of a task's conduit. Consumed by its single write.
struct ConduitWriter<T> {
  task_id: TaskId,
  name: String,
  coordinator_id: String,
  notifier: Arc<dyn CoordinatorNotifier>,
  sender: oneshot::Sender<TaskResult<T>>,
}

impl<T> ConduitWriter<T> {
  fn write(self, outcome: Result<T, TaskError>, started: Instant) {
    let success = outcome.is_ok();
    match &outcome {
      Ok(_) => info!("task_finished"),
      Err(e) => error!(error = %e, "task_failed"),
    }

    self.notifier.notify(CoordinatorEvent::TaskFinished {
      coordinator_id: self.coordinator_id,
      task_id: self.task_id,
      success,
    });

    let result = TaskResult {
      task_id: self.task_id,
      name: self.name,
      outcome,
      elapsed_ms: started.elapsed().as_millis() as u64,
    };

    if self.sender.send(result).is_err() {
      debug!("coordinator gone, result dropped");
    }
  }
}

/// Receiving end of a task's conduit, as held in the coordinator's wait set.
///
/// Resolves once, when the task writes its result or drops the writer.
pub(crate) struct Conduit<T> {
  task_id: TaskId,
  name: String,
  receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> Conduit<T> {
  pub(crate) fn new(
    task_id: TaskId,
    name: String,
    receiver: oneshot::Receiver<TaskResult<T>>,
  ) -> Self {
    Self {
      task_id,
      name,
      receiver,
    }
  }
}

/// What a conduit yields: the task it belongs to and what was received.
pub(crate) type Delivery<T> = (TaskId, String, Result<TaskResult<T>, oneshot::error::RecvError>);

impl<T> Future for Conduit<T> {
  type Output = Delivery<T>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let received = ready!(Pin::new(&mut self.receiver).poll(cx));
    let name = std::mem::take(&mut self.name);
    Poll::Ready((self.task_id, name, received))
  }
}

//! Fan-in coordination for fanin.
//!
//! A [`Coordinator`] runs a fixed batch of [`Task`]s concurrently and hands
//! their results back one at a time, in the order they finish.
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//! ├── submit(task) -> TaskId      spawns the work, keeps its conduit
//! ├── await_next(timeout) -> Next first conduit to fire, or Timeout/Drained
//! ├── try_next() -> Next          non-blocking poll of the conduits
//! ├── drain(timeout)              collects until drained or out of time
//! ├── into_stream()               results as a Stream
//! └── cancel()                    advisory stop for unfinished tasks
//!
//! Task ──(oneshot conduit, written once)──▶ Coordinator wait set
//! ```
//!
//! A task's own failure, including a panic, becomes the failed outcome of
//! its [`TaskResult`]. Only misuse of the coordinator surfaces as a
//! [`CoordinatorError`].
//!
//! # Usage
//!
//! ```ignore
//! use fanin_config::CoordinatorConfig;
//! use fanin_coordinator::{Coordinator, Next, Task};
//!
//! let mut coordinator = Coordinator::new(CoordinatorConfig::default());
//! for (i, ms) in [30u64, 10, 20].into_iter().enumerate() {
//!   coordinator.submit(Task::new(format!("sleep-{}", ms), move |_cancel| async move {
//!     tokio::time::sleep(Duration::from_millis(ms)).await;
//!     Ok(i)
//!   }))?;
//! }
//!
//! while let Next::Ready(result) = coordinator.await_next(Duration::from_secs(1)).await? {
//!   println!("{} -> {:?}", result.name, result.outcome);
//! }
//! ```

mod coordinator;
mod error;
mod events;
mod result;
mod task;

pub use coordinator::{Coordinator, DrainReport};
pub use error::{CoordinatorError, TaskError};
pub use events::{ChannelNotifier, CoordinatorEvent, CoordinatorNotifier, NoopNotifier};
pub use result::{Next, TaskId, TaskResult};
pub use task::Task;

pub use tokio_util::sync::CancellationToken;

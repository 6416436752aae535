//! Integration tests for submitting and awaiting tasks.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use fanin_config::CoordinatorConfig;
use fanin_coordinator::{
  Coordinator, CoordinatorError, Next, Task, TaskError, TaskId, TaskResult,
};
use tokio::time::{Instant, sleep};

fn sleeper(name: &str, ms: u64, value: u64) -> Task<u64> {
  Task::new(name, move |_cancel| async move {
    sleep(Duration::from_millis(ms)).await;
    Ok(value)
  })
}

async fn next_ready<T: Send + 'static>(coordinator: &mut Coordinator<T>) -> TaskResult<T> {
  coordinator
    .await_next(Duration::from_secs(1))
    .await
    .expect("await_next failed")
    .ready()
    .expect("expected a ready result")
}

#[tokio::test(start_paused = true)]
async fn test_fastest_first() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  for (index, ms) in [10, 20, 30].into_iter().enumerate() {
    coordinator
      .submit(sleeper(&format!("t{}", index), ms, index as u64))
      .unwrap();
  }

  for expected in 0..3u64 {
    let result = next_ready(&mut coordinator).await;
    assert_eq!(result.outcome, Ok(expected));
    assert_eq!(result.task_id.index(), expected);
  }

  assert!(
    coordinator
      .await_next(Duration::from_secs(1))
      .await
      .unwrap()
      .is_drained()
  );
}

#[tokio::test(start_paused = true)]
async fn test_completion_order_not_submission_order() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  coordinator.submit(sleeper("slow", 30, 0)).unwrap();
  coordinator.submit(sleeper("fast", 10, 1)).unwrap();
  coordinator.submit(sleeper("middle", 20, 2)).unwrap();

  let mut names = Vec::new();
  for _ in 0..3 {
    names.push(next_ready(&mut coordinator).await.name);
  }
  assert_eq!(names, vec!["fast", "middle", "slow"]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_result() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());
  coordinator.submit(sleeper("long", 500, 7)).unwrap();

  let next = coordinator
    .await_next(Duration::from_millis(10))
    .await
    .unwrap();
  assert!(next.is_timeout());
  assert_eq!(coordinator.pending(), 1);

  let result = coordinator
    .await_next(Duration::from_millis(1000))
    .await
    .unwrap()
    .ready()
    .unwrap();
  assert_eq!(result.name, "long");
  assert_eq!(result.outcome, Ok(7));
}

#[tokio::test]
async fn test_empty_batch_drains_immediately() {
  common::init_logging();
  let mut coordinator: Coordinator<u64> = Coordinator::new(CoordinatorConfig::default());

  let start = Instant::now();
  let next = coordinator.await_next(Duration::from_secs(5)).await.unwrap();
  assert!(next.is_drained());
  assert!(start.elapsed() < Duration::from_secs(1));
  assert!(coordinator.is_drained());
}

#[tokio::test(start_paused = true)]
async fn test_each_task_delivered_exactly_once() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  let sleeps = [40, 5, 25, 5, 15, 35, 0, 20];
  let mut submitted = HashSet::new();
  for (index, ms) in sleeps.into_iter().enumerate() {
    let id = coordinator
      .submit(sleeper(&format!("t{}", index), ms, index as u64))
      .unwrap();
    submitted.insert(id);
  }

  let mut seen: HashSet<TaskId> = HashSet::new();
  loop {
    match coordinator.await_next(Duration::from_secs(1)).await.unwrap() {
      Next::Ready(result) => {
        assert!(seen.insert(result.task_id), "{} delivered twice", result.task_id);
        assert_eq!(result.outcome, Ok(result.task_id.index()));
      }
      Next::Drained => break,
      Next::Timeout => panic!("unexpected timeout"),
    }
  }

  assert_eq!(seen, submitted);
  assert_eq!(coordinator.delivered(), sleeps.len());
  assert!(
    coordinator
      .await_next(Duration::from_secs(1))
      .await
      .unwrap()
      .is_drained()
  );
}

#[tokio::test(start_paused = true)]
async fn test_submit_after_wait_is_rejected() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());
  coordinator.submit(sleeper("first", 10, 0)).unwrap();

  let _ = coordinator.await_next(Duration::from_millis(1)).await.unwrap();

  let err = coordinator.submit(sleeper("late", 10, 1)).unwrap_err();
  assert_eq!(err, CoordinatorError::AlreadyStarted);
}

#[tokio::test]
async fn test_submit_after_try_next_is_rejected() {
  common::init_logging();
  let mut coordinator: Coordinator<u64> = Coordinator::new(CoordinatorConfig::default());
  let _ = coordinator.try_next().unwrap();

  let err = coordinator.submit(sleeper("late", 10, 1)).unwrap_err();
  assert_eq!(err, CoordinatorError::AlreadyStarted);
}

#[tokio::test(start_paused = true)]
async fn test_failed_task_is_delivered_as_result() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  coordinator
    .submit(Task::new("broken", |_cancel| async move {
      sleep(Duration::from_millis(5)).await;
      Err::<u64, _>(TaskError::failed("disk full"))
    }))
    .unwrap();
  coordinator.submit(sleeper("fine", 10, 1)).unwrap();

  let first = next_ready(&mut coordinator).await;
  assert_eq!(first.name, "broken");
  assert_eq!(first.outcome, Err(TaskError::failed("disk full")));
  assert!(!first.is_ok());

  let second = next_ready(&mut coordinator).await;
  assert_eq!(second.outcome, Ok(1));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_is_delivered_as_result() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  coordinator
    .submit(Task::new("exploding", |_cancel| async move {
      sleep(Duration::from_millis(5)).await;
      if true {
        panic!("kaboom");
      }
      Ok(0u64)
    }))
    .unwrap();
  coordinator.submit(sleeper("sibling", 10, 1)).unwrap();

  let first = next_ready(&mut coordinator).await;
  assert_eq!(first.name, "exploding");
  assert_eq!(
    first.outcome,
    Err(TaskError::Panicked {
      message: "kaboom".to_string()
    })
  );

  let second = next_ready(&mut coordinator).await;
  assert_eq!(second.name, "sibling");
  assert_eq!(second.outcome, Ok(1));
}

#[tokio::test(start_paused = true)]
async fn test_overall_deadline_caps_long_wait() {
  common::init_logging();
  let config = CoordinatorConfig::default().with_deadline(Duration::from_millis(50));
  let mut coordinator = Coordinator::new(config);
  coordinator.submit(sleeper("late", 200, 9)).unwrap();

  let start = Instant::now();
  let next = coordinator.await_next(Duration::from_secs(10)).await.unwrap();
  let waited = start.elapsed();
  assert!(next.is_timeout());
  assert!(waited >= Duration::from_millis(50), "waited {:?}", waited);
  assert!(waited < Duration::from_millis(60), "waited {:?}", waited);

  // Past the deadline, waits return at once while the task is still running.
  let start = Instant::now();
  let next = coordinator.await_next(Duration::from_secs(10)).await.unwrap();
  assert!(next.is_timeout());
  assert!(start.elapsed() < Duration::from_millis(5));

  // A result that arrived after the deadline is still handed out.
  sleep(Duration::from_millis(200)).await;
  let result = coordinator
    .await_next(Duration::from_secs(10))
    .await
    .unwrap()
    .ready()
    .unwrap();
  assert_eq!(result.outcome, Ok(9));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_abort_siblings() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());
  coordinator.submit(sleeper("a", 100, 0)).unwrap();
  coordinator.submit(sleeper("b", 150, 1)).unwrap();

  for _ in 0..5 {
    let next = coordinator.await_next(Duration::from_millis(5)).await.unwrap();
    assert!(next.is_timeout());
  }

  let report = coordinator.drain(Duration::from_secs(1)).await.unwrap();
  assert!(report.drained);
  assert_eq!(report.results.len(), 2);
  assert!(report.results.iter().all(|r| r.is_ok()));
}

#[tokio::test(start_paused = true)]
async fn test_try_next_does_not_block() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());
  coordinator.submit(sleeper("later", 50, 3)).unwrap();

  let start = Instant::now();
  assert!(coordinator.try_next().unwrap().is_timeout());
  assert_eq!(start.elapsed(), Duration::ZERO);

  sleep(Duration::from_millis(60)).await;
  let result = coordinator.try_next().unwrap().ready().unwrap();
  assert_eq!(result.outcome, Ok(3));
  assert!(coordinator.try_next().unwrap().is_drained());
}

#[tokio::test(start_paused = true)]
async fn test_drain_stops_at_timeout() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());
  coordinator.submit(sleeper("quick", 10, 0)).unwrap();
  coordinator.submit(sleeper("glacial", 10_000, 1)).unwrap();

  let report = coordinator.drain(Duration::from_millis(100)).await.unwrap();
  assert!(!report.drained);
  assert_eq!(report.results.len(), 1);
  assert_eq!(report.results[0].name, "quick");
  assert_eq!(coordinator.pending(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_wait_from_config() {
  common::init_logging();
  let config = CoordinatorConfig {
    wait_ms: 20,
    ..CoordinatorConfig::default()
  };
  let mut coordinator = Coordinator::new(config);
  coordinator.submit(sleeper("slow", 100, 0)).unwrap();

  let start = Instant::now();
  assert!(coordinator.await_next_default().await.unwrap().is_timeout());
  assert!(start.elapsed() >= Duration::from_millis(20));
  assert!(start.elapsed() < Duration::from_millis(30));
}

#[tokio::test]
async fn test_max_tasks_enforced() {
  common::init_logging();
  let config = CoordinatorConfig::default().with_max_tasks(2);
  let mut coordinator = Coordinator::new(config);

  coordinator.submit(sleeper("a", 0, 0)).unwrap();
  coordinator.submit(sleeper("b", 0, 1)).unwrap();
  let err = coordinator.submit(sleeper("c", 0, 2)).unwrap_err();
  assert_eq!(err, CoordinatorError::CapacityExceeded { limit: 2 });
  assert_eq!(coordinator.pending(), 2);
}

#[tokio::test]
async fn test_every_rejected_submit_is_logged() {
  let config = CoordinatorConfig::default().with_max_tasks(1);
  let mut coordinator = Coordinator::new(config);
  coordinator.submit(sleeper("a", 0, 0)).unwrap();

  let (err, logs) = common::capture_logs(|| coordinator.submit(sleeper("b", 0, 1)).unwrap_err());
  assert_eq!(err, CoordinatorError::CapacityExceeded { limit: 1 });
  assert!(logs.contains("WARN"), "logs: {}", logs);
  assert!(logs.contains("task limit reached"), "logs: {}", logs);
  assert!(logs.contains("limit=1"), "logs: {}", logs);

  let mut cancelled: Coordinator<u64> = Coordinator::new(CoordinatorConfig::default());
  cancelled.cancel();
  let (err, logs) = common::capture_logs(|| cancelled.submit(sleeper("c", 0, 2)).unwrap_err());
  assert_eq!(err, CoordinatorError::Cancelled);
  assert!(logs.contains("submit after cancellation"), "logs: {}", logs);

  let mut started: Coordinator<u64> = Coordinator::new(CoordinatorConfig::default());
  let _ = started.try_next().unwrap();
  let (err, logs) = common::capture_logs(|| started.submit(sleeper("d", 0, 3)).unwrap_err());
  assert_eq!(err, CoordinatorError::AlreadyStarted);
  assert!(logs.contains("submit after draining started"), "logs: {}", logs);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_tasks() {
  common::init_logging();
  let mut coordinator = Coordinator::new(CoordinatorConfig::default());

  coordinator
    .submit(Task::blocking("slow", |_cancel| {
      std::thread::sleep(Duration::from_millis(200));
      Ok(1u64)
    }))
    .unwrap();
  coordinator
    .submit(Task::blocking("quick", |_cancel| Ok(2u64)))
    .unwrap();
  coordinator
    .submit(Task::blocking("exploding", |_cancel| -> Result<u64, TaskError> {
      panic!("blocking kaboom")
    }))
    .unwrap();

  let report = coordinator.drain(Duration::from_secs(10)).await.unwrap();
  assert!(report.drained);
  assert_eq!(report.results.len(), 3);
  assert_eq!(report.results[2].name, "slow");
  assert_eq!(report.results[2].outcome, Ok(1));

  let exploded = report
    .results
    .iter()
    .find(|r| r.name == "exploding")
    .unwrap();
  assert_eq!(
    exploded.outcome,
    Err(TaskError::Panicked {
      message: "blocking kaboom".to_string()
    })
  );
}

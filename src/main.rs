use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fanin_config::{CoordinatorConfig, PlanDef, TaskBehavior, TaskDef};
use fanin_coordinator::{Coordinator, Next, Task, TaskError};

/// Fanin - run a batch of tasks and collect their results as they finish
#[derive(Parser)]
#[command(name = "fanin")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the tasks described by a plan file
  Run {
    /// Path to the plan file (JSON)
    plan_file: PathBuf,

    /// Per-result wait in milliseconds (overrides the plan's wait_ms)
    #[arg(long)]
    wait_ms: Option<u64>,
  },

  /// Run a built-in batch of three sleeping tasks
  Demo,
}

fn main() -> Result<()> {
  init_logging();
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run { plan_file, wait_ms }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_plan_file(plan_file, wait_ms).await })?;
    }
    Some(Commands::Demo) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_plan(&demo_plan(), None).await })?;
    }
    None => {
      println!("fanin - use --help to see available commands");
    }
  }

  Ok(())
}

fn init_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();
}

async fn run_plan_file(plan_file: PathBuf, wait_ms: Option<u64>) -> Result<()> {
  let plan = load_plan(&plan_file).await?;
  run_plan(&plan, wait_ms).await
}

async fn run_plan(plan: &PlanDef, wait_ms: Option<u64>) -> Result<()> {
  eprintln!("Running plan: {} ({} tasks)", plan.name, plan.tasks.len());

  let wait = wait_ms
    .map(Duration::from_millis)
    .unwrap_or_else(|| plan.coordinator.wait());

  let stdout = io::stdout();
  let drained = execute_plan(plan, wait, &mut stdout.lock()).await?;

  if drained {
    eprintln!("All results delivered");
  } else {
    eprintln!("Stopped waiting before every task finished");
  }

  Ok(())
}

async fn load_plan(plan_file: &Path) -> Result<PlanDef> {
  let content = tokio::fs::read_to_string(plan_file)
    .await
    .with_context(|| format!("failed to read plan file: {}", plan_file.display()))?;

  PlanDef::from_json(&content)
    .with_context(|| format!("failed to load plan file: {}", plan_file.display()))
}

/// Submit every task in the plan and write one JSON line per result, in
/// completion order. Returns whether the batch fully drained.
async fn execute_plan(plan: &PlanDef, wait: Duration, out: &mut impl Write) -> Result<bool> {
  let mut coordinator = Coordinator::new(plan.coordinator.clone());

  for (index, def) in plan.tasks.iter().enumerate() {
    coordinator
      .submit(plan_task(index, def))
      .with_context(|| format!("failed to submit task '{}'", def.name))?;
  }

  loop {
    match coordinator.await_next(wait).await? {
      Next::Ready(result) => {
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
      }
      Next::Timeout => {
        warn!(
          plan = %plan.name,
          pending = coordinator.pending(),
          "timed out waiting for results"
        );
        coordinator.cancel();
        return Ok(false);
      }
      Next::Drained => return Ok(true),
    }
  }
}

/// Build the task for one plan entry: sleep, then act out its behavior.
fn plan_task(index: usize, def: &TaskDef) -> Task<serde_json::Value> {
  let sleep = Duration::from_millis(def.sleep_ms);
  let behavior = def.behavior.clone();

  Task::new(def.name.clone(), move |cancel| async move {
    tokio::select! {
      _ = tokio::time::sleep(sleep) => {}
      _ = cancel.cancelled() => return Err(TaskError::Cancelled),
    }

    match behavior {
      TaskBehavior::Succeed { value } => Ok(value.unwrap_or_else(|| serde_json::json!(index))),
      TaskBehavior::Fail { message } => Err(TaskError::failed(message)),
      TaskBehavior::Panic { message } => panic!("{}", message),
    }
  })
}

fn demo_plan() -> PlanDef {
  PlanDef {
    name: "demo".to_string(),
    coordinator: CoordinatorConfig::default(),
    tasks: [10, 20, 30]
      .into_iter()
      .map(|ms| TaskDef {
        name: format!("sleep-{}ms", ms),
        sleep_ms: ms,
        behavior: TaskBehavior::default(),
      })
      .collect(),
  }
}

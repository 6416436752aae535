//! Fanin Config
//!
//! This crate contains the serializable configuration types for fanin.
//!
//! - [`CoordinatorConfig`] holds the settings a coordinator is built with:
//!   the overall deadline, the default wait and an optional bound on the
//!   number of tasks.
//! - [`PlanDef`] describes a named batch of demo tasks that the CLI loads
//!   from a JSON file and runs through a coordinator.

mod coordinator;
mod error;
mod plan;

pub use coordinator::CoordinatorConfig;
pub use error::ConfigError;
pub use plan::{PlanDef, TaskBehavior, TaskDef};

//! Armory execution core.
//!
//! Validates per-tool parameters, builds argument vectors as discrete
//! tokens, runs the external binary with a bounded lifetime, and keeps a
//! rolling history of executions for health and debug introspection. The
//! HTTP front door and any protocol adapters sit on top of
//! [`executor::Coordinator`].

pub mod availability;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod registry;
pub mod runner;

pub use command::{CommandPlan, ToolRequest};
pub use config::{load_config, ArmoryConfig};
pub use error::{ExecuteError, ValidationError};
pub use executor::{Coordinator, ToolTestReport};
pub use history::{ExecutionRecord, HISTORY_CAPACITY};
pub use registry::Registry;
pub use runner::{ExecStatus, ExecutionResult};

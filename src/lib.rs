#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod bootstrap;
mod config;
mod core;
mod engine;
mod error;
pub mod hygiene;
pub mod pipeline;
pub mod steps;
mod tool;
mod utils;

pub use crate::bootstrap::{ENV_CACHE_PATH, ENV_CLI, ENV_CWD, ENV_DEV};
pub use crate::config::{CONFIG_FILE, Config};
pub use crate::core::{Environment, Metadata, TaskContext};
pub use crate::engine::{Diagnostics, Registry, Task, TaskExecution, TaskResult, run_task, series};
pub use crate::error::*;
pub use crate::pipeline::{CompileTasks, Toolchain};
pub use crate::tool::ExternalTool;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;

/// Every task of the build: the compile pipelines, their proposal-names
/// sub-task and the hygiene gate.
pub fn standard_registry(config: &Config, toolchain: &Toolchain) -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();

    pipeline::register_compile_tasks(&mut registry, config, toolchain)?;
    hygiene::register_hygiene_tasks(&mut registry, toolchain.linter.clone())?;

    Ok(registry)
}

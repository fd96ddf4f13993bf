//! The compile pipelines, assembled from the build steps.
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{Registry, Task, series};
use crate::error::RegistryError;
use crate::hygiene::Linter;
use crate::steps::{
    CompileOptions, Compiler, Optimizer, build_web_node_paths, compile_api_proposal_names,
    compile_task, optimize_loader_task, rimraf,
};

/// The external tools the pipelines delegate to.
#[derive(Clone)]
pub struct Toolchain {
    pub compiler: Arc<dyn Compiler>,
    pub optimizer: Arc<dyn Optimizer>,
    pub linter: Arc<dyn Linter>,
}

impl Toolchain {
    /// The tools configured in `kumitate.json`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            compiler: Arc::new(config.compiler.clone()),
            optimizer: Arc::new(config.optimizer.clone()),
            linter: Arc::new(config.linter.clone()),
        }
    }
}

/// Full build of the source tree into the output directory.
///
/// Runs, in order: clean the output, write the web module table, the
/// `proposals` task, compile (mangling unless `disable_mangle`), optimize the
/// output in place.
pub fn make_compile_build_task(
    config: &Config,
    toolchain: &Toolchain,
    proposals: Task,
    disable_mangle: bool,
) -> Task {
    let out = &config.out_dir;

    series([
        rimraf(out.clone()),
        build_web_node_paths(out.clone()),
        proposals,
        compile_task(
            toolchain.compiler.clone(),
            config.src_dir.clone(),
            out.clone(),
            true,
            CompileOptions { disable_mangle },
        ),
        optimize_loader_task(toolchain.optimizer.clone(), out.clone(), out.clone(), true),
    ])
}

/// Handles of the registered compile tasks, for composing other pipelines.
#[derive(Debug, Clone)]
pub struct CompileTasks {
    pub proposals: Task,
    /// Mangled and minified.
    pub build: Task,
    /// Same as `build` with mangling off, for pull request CI.
    pub build_pr: Task,
}

pub fn register_compile_tasks(
    registry: &mut Registry,
    config: &Config,
    toolchain: &Toolchain,
) -> Result<CompileTasks, RegistryError> {
    let proposals = registry.define("compile-api-proposal-names", compile_api_proposal_names())?;

    let build = registry.define(
        "compile-build",
        make_compile_build_task(config, toolchain, proposals.clone(), false),
    )?;

    let build_pr = registry.define(
        "compile-build-pr",
        make_compile_build_task(config, toolchain, proposals.clone(), true),
    )?;

    Ok(CompileTasks {
        proposals,
        build,
        build_pr,
    })
}

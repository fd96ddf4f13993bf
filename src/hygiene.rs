//! Dependency consistency between the root `package.json` and the
//! subordinate manifests, followed by the external linter.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::engine::{Registry, Task, series};
use crate::error::{ConfigError, HygieneError, RegistryError, ToolError};
use crate::utils::read_json;

/// The root manifest every other manifest is checked against.
pub const ROOT_MANIFEST: &str = "package.json";

/// The dependency sections of a `package.json`. Missing sections are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Manifest {
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dependencies,
    DevDependencies,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Dependencies => f.write_str("dependencies"),
            Section::DevDependencies => f.write_str("devDependencies"),
        }
    }
}

/// A dependency pinned to a different version than in the root manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Manifest the dependency was found in, relative to the root.
    pub path: Utf8PathBuf,
    pub section: Section,
    pub name: String,
    pub version: String,
    pub root_version: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency {} in '{}' ({}) differs from root package.json ({})",
            self.name, self.path, self.version, self.root_version
        )
    }
}

/// Compares both dependency sections of `actual` against `root`, pushing one
/// [`Mismatch`] per differing version. Dependencies the root doesn't declare
/// (or declares with an empty version) are not checked.
pub fn check_package_json(
    root: &Manifest,
    path: &Utf8Path,
    actual: &Manifest,
    errors: &mut Vec<Mismatch>,
) {
    let sections = [
        (Section::Dependencies, &actual.dependencies, &root.dependencies),
        (Section::DevDependencies, &actual.dev_dependencies, &root.dev_dependencies),
    ];

    for (section, deps, root_deps) in sections {
        for (name, version) in deps {
            let Some(root_version) = root_deps.get(name).filter(|v| !v.is_empty()) else {
                continue;
            };

            if version != root_version {
                errors.push(Mismatch {
                    path: path.to_owned(),
                    section,
                    name: name.clone(),
                    version: version.clone(),
                    root_version: root_version.clone(),
                });
            }
        }
    }
}

/// Checks every manifest listed in the configuration against the root one.
/// All mismatches are collected before the task fails; an unreadable
/// manifest fails it right away.
pub fn check_package_json_task() -> Task {
    Task::named("check-package-json", |ctx| {
        let root = Manifest::load(&ctx.env.path(ROOT_MANIFEST)).map_err(HygieneError::from)?;
        let mut errors = Vec::new();

        for path in &ctx.env.config.manifests {
            let actual = Manifest::load(&ctx.env.path(path)).map_err(HygieneError::from)?;
            check_package_json(&root, path, &actual, &mut errors);
        }

        if !errors.is_empty() {
            for mismatch in &errors {
                tracing::error!("{mismatch}");
            }
            return Err(HygieneError::Mismatches(errors).into());
        }

        tracing::info!("{} manifests agree with {ROOT_MANIFEST}", ctx.env.config.manifests.len());
        Ok(())
    })
}

/// Lints and formats the sources.
pub trait Linter: Send + Sync {
    fn lint(&self, root: &Utf8Path) -> Result<(), ToolError>;
}

/// Runs `check` and then the linter.
pub fn hygiene_task(check: Task, linter: Arc<dyn Linter>) -> Task {
    series([
        check,
        Task::action(move |ctx| {
            ctx.set_message("Linting");
            linter.lint(&ctx.env.root)?;
            Ok(())
        }),
    ])
}

/// Handles of the registered hygiene tasks.
#[derive(Debug, Clone)]
pub struct HygieneTasks {
    pub check: Task,
    pub hygiene: Task,
}

pub fn register_hygiene_tasks(
    registry: &mut Registry,
    linter: Arc<dyn Linter>,
) -> Result<HygieneTasks, RegistryError> {
    let check = registry.define("check-package-json", check_package_json_task())?;
    let hygiene = registry.define("hygiene", hygiene_task(check.clone(), linter))?;

    Ok(HygieneTasks { check, hygiene })
}

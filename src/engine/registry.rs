use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::core::Environment;
use crate::engine::{Diagnostics, Task, TaskGraph, run_task};
use crate::error::{RegistryError, RunError};

/// The set of tasks invokable by name.
///
/// A name maps to at most one task: defining the same name twice is an error
/// and leaves the first definition in place.
///
/// # Example
///
/// ```rust
/// use kumitate::{Registry, Task, series};
///
/// let mut registry = Registry::new();
/// let hello = registry
///     .define("hello", Task::action(|_| Ok(())))
///     .unwrap();
///
/// registry.define("twice", series([hello.clone(), hello])).unwrap();
/// assert!(registry.define("hello", Task::action(|_| Ok(()))).is_err());
/// assert_eq!(registry.names().collect::<Vec<_>>(), ["hello", "twice"]);
/// ```
#[derive(Default)]
pub struct Registry {
    tasks: BTreeMap<String, Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names `task` and registers it. The returned handle is the registered
    /// task itself, ready to be composed into other pipelines.
    pub fn define(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        task: Task,
    ) -> Result<Task, RegistryError> {
        let name = name.into();

        if self.tasks.contains_key(name.as_ref()) {
            return Err(RegistryError::Duplicate(name.into_owned()));
        }

        let task = task.with_name(name.clone());
        self.tasks.insert(name.into_owned(), task.clone());

        Ok(task)
    }

    pub fn get(&self, name: &str) -> Result<&Task, RegistryError> {
        self.tasks
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Runs the task registered under `name` exactly once.
    pub fn run(&self, name: &str, env: &Environment) -> Result<Diagnostics, RunError> {
        let task = self.get(name)?;
        tracing::debug!("running task {name}");
        run_task(task, env)
    }
}

/// Mermaid graph of every registered task and what it is composed of.
impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        TaskGraph::from_tasks(self.tasks.values()).write_mermaid(f, |_| None)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::Config;
    use crate::engine::series;

    #[derive(Debug, thiserror::Error)]
    #[error("exit code {0}")]
    struct Failure(i32);

    fn env() -> Environment {
        Environment::new("/nonexistent", Config::default())
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Task::action(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_define_then_run_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.define("count", counting(&counter)).unwrap();

        let diagnostics = registry.run("count", &env()).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(diagnostics.order(), vec!["count"]);
    }

    #[test]
    fn test_run_propagates_failure_unchanged() {
        let mut registry = Registry::new();
        registry
            .define("fail", Task::action(|_| Err(Failure(3).into())))
            .unwrap();

        let err = registry.run("fail", &env()).unwrap_err();

        let RunError::Failed { task, source, .. } = err else {
            panic!("expected a task failure");
        };
        assert_eq!(task, "fail");
        assert_eq!(source.downcast_ref::<Failure>().map(|f| f.0), Some(3));
        assert_eq!(source.to_string(), "exit code 3");
    }

    #[test]
    fn test_duplicate_is_rejected_and_first_kept() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();

        registry.define("dup", counting(&first)).unwrap();
        let err = registry.define("dup", counting(&second)).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "dup"));

        registry.run("dup", &env()).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_name() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        let err = registry.run("missing", &env()).unwrap_err();
        assert!(matches!(
            err,
            RunError::Registry(RegistryError::NotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_define_renames_and_returns_handle() {
        let mut registry = Registry::new();
        let handle = registry
            .define("renamed", Task::named("original", |_| Ok(())))
            .unwrap();

        assert_eq!(handle.name(), Some("renamed"));
        assert!(registry.contains("renamed"));
        assert!(!registry.contains("original"));
    }

    #[test]
    fn test_display_lists_composition() {
        let mut registry = Registry::new();
        let leaf = registry.define("leaf", Task::action(|_| Ok(()))).unwrap();
        registry.define("root", series([leaf])).unwrap();

        let out = registry.to_string();
        assert!(out.starts_with("graph LR\n"));
        assert!(out.contains("[\"leaf\"]"));
        assert!(out.contains("[\"root\"]"));
        assert!(out.contains("-- \"1\" -->"));
        assert_eq!(format!("{registry:?}"), r#"{"leaf", "root"}"#);
    }
}

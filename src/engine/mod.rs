mod graph;
mod registry;
mod runner;

use std::borrow::Cow;
use std::sync::Arc;

use crate::TaskContext;

pub use crate::engine::registry::Registry;
pub use crate::engine::runner::{Diagnostics, TaskExecution, run_task};

pub(crate) use crate::engine::graph::TaskGraph;

/// Result from a single task action.
pub type TaskResult = anyhow::Result<()>;

type ActionFn = dyn Fn(&TaskContext<'_>) -> TaskResult + Send + Sync;

#[derive(Clone)]
pub(crate) enum Body {
    Action(Arc<ActionFn>),
    Series(Arc<[Task]>),
}

/// A unit of build work.
///
/// A task is either a single action or an ordered series of other tasks. It
/// is immutable once built and cheap to clone, so the same task can take part
/// in several pipelines. Tasks get a name either when they are built (step
/// constructors name their tasks) or when they are registered with
/// [`Registry::define`].
#[derive(Clone)]
pub struct Task {
    name: Option<Cow<'static, str>>,
    pub(crate) body: Body,
}

impl Task {
    /// Creates an unnamed task from an action.
    pub fn action<F>(action: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> TaskResult + Send + Sync + 'static,
    {
        Self {
            name: None,
            body: Body::Action(Arc::new(action)),
        }
    }

    /// Creates a named task from an action.
    pub fn named<F>(name: impl Into<Cow<'static, str>>, action: F) -> Self
    where
        F: Fn(&TaskContext<'_>) -> TaskResult + Send + Sync + 'static,
    {
        Self::action(action).with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display purposes, unnamed tasks are described by their shape.
    pub fn label(&self) -> Cow<'_, str> {
        match (&self.name, &self.body) {
            (Some(name), _) => Cow::Borrowed(name),
            (None, Body::Action(_)) => Cow::Borrowed("<action>"),
            (None, Body::Series(tasks)) => Cow::Owned(format!("<series of {}>", tasks.len())),
        }
    }

    /// Tasks composed by this one, in execution order.
    pub fn children(&self) -> &[Task] {
        match &self.body {
            Body::Action(_) => &[],
            Body::Series(tasks) => &tasks[..],
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body {
            Body::Action(_) => write!(f, "Task({})", self.label()),
            Body::Series(tasks) => f
                .debug_tuple("Series")
                .field(&self.name())
                .field(tasks)
                .finish(),
        }
    }
}

/// Composes tasks into one unnamed task that runs them strictly left to
/// right. The first failure is returned as is and the remaining tasks never
/// start.
pub fn series(tasks: impl IntoIterator<Item = Task>) -> Task {
    Task {
        name: None,
        body: Body::Series(tasks.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let a = Task::named("a", |_| Ok(()));
        let b = Task::action(|_| Ok(()));
        let s = series([a.clone(), b.clone()]);

        assert_eq!(a.label(), "a");
        assert_eq!(b.label(), "<action>");
        assert_eq!(s.label(), "<series of 2>");
        assert_eq!(s.name(), None);
        assert_eq!(s.children().len(), 2);
        assert_eq!(s.children()[0].name(), Some("a"));
        assert!(a.children().is_empty());

        let named = s.with_name("both");
        assert_eq!(named.label(), "both");
    }
}

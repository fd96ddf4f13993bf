mod diagnostics;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::core::{Environment, TaskContext};
use crate::engine::{Body, Task, TaskResult};
use crate::error::RunError;
use crate::utils::{STYLE_TASK, as_overhead};

pub use diagnostics::Diagnostics;

/// Timing of one named task.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub name: String,
    pub start: Instant,
    pub duration: Duration,
    pub failed: bool,
}

/// Runs a task tree to completion, one task at a time.
///
/// Tasks in a series start only after the previous one returned. The first
/// failure stops the run; the error returned by the failing action is kept
/// unchanged as the source of [`RunError::Failed`], next to the diagnostics of
/// everything that ran before.
pub fn run_task(task: &Task, env: &Environment) -> Result<Diagnostics, RunError> {
    let s = Instant::now();
    let mut diagnostics = Diagnostics::default();

    match execute(task, env, &tracing::Span::current(), &mut diagnostics) {
        Ok(()) => {
            tracing::info!("{} complete {}", task.label(), as_overhead(s));
            Ok(diagnostics)
        }
        Err(source) => {
            // Executions are recorded on completion, so the first failed entry
            // is the innermost named task.
            let task = diagnostics
                .executions
                .iter()
                .find(|execution| execution.failed)
                .map(|execution| execution.name.clone())
                .unwrap_or_else(|| task.label().into_owned());

            Err(RunError::Failed {
                task,
                diagnostics,
                source,
            })
        }
    }
}

fn execute(
    task: &Task,
    env: &Environment,
    span: &tracing::Span,
    diagnostics: &mut Diagnostics,
) -> TaskResult {
    let Some(name) = task.name() else {
        return execute_body(task, env, span, diagnostics);
    };

    let span = tracing::span!(Level::INFO, "task", name);
    span.pb_set_style(&STYLE_TASK);
    span.pb_set_message(&format!("Running {name}"));
    let _enter = span.enter();

    let start = Instant::now();
    let result = execute_body(task, env, &span, diagnostics);
    let duration = start.elapsed();

    match &result {
        Ok(()) => tracing::info!("finished {name} {}", as_overhead(start)),
        Err(_) => tracing::error!("{name} failed after {duration:.2?}"),
    }

    diagnostics.executions.push(TaskExecution {
        name: name.to_string(),
        start,
        duration,
        failed: result.is_err(),
    });

    result
}

fn execute_body(
    task: &Task,
    env: &Environment,
    span: &tracing::Span,
    diagnostics: &mut Diagnostics,
) -> TaskResult {
    match &task.body {
        Body::Action(action) => {
            let context = TaskContext {
                env,
                span: span.clone(),
            };

            // A panicking action fails its pipeline like any other error.
            match catch_unwind(AssertUnwindSafe(|| action(&context))) {
                Ok(result) => result,
                Err(panic) => {
                    let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                        format!("Task panicked: {s}")
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        format!("Task panicked: {s}")
                    } else {
                        String::from("Task panicked with unknown payload")
                    };

                    Err(anyhow::anyhow!(msg))
                }
            }
        }
        Body::Series(tasks) => {
            for task in tasks.iter() {
                execute(task, env, span, diagnostics)?;
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::Config;
    use crate::engine::series;

    #[derive(Debug, thiserror::Error)]
    #[error("step {0} broke")]
    struct Broken(&'static str);

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(log: &Log, name: &'static str, fail: bool) -> Task {
        let log = log.clone();
        Task::named(name, move |_| {
            log.lock().unwrap().push(name);
            if fail {
                Err(Broken(name).into())
            } else {
                Ok(())
            }
        })
    }

    fn env() -> Environment {
        Environment::new("/nonexistent", Config::default())
    }

    #[test]
    fn test_series_runs_in_order() {
        let log = Log::default();
        let pipeline = series([
            recorder(&log, "t1", false),
            recorder(&log, "t2", false),
            recorder(&log, "t3", false),
            recorder(&log, "t4", false),
        ]);

        let diagnostics = run_task(&pipeline, &env()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2", "t3", "t4"]);
        assert_eq!(diagnostics.order(), vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_series_stops_at_first_failure() {
        let log = Log::default();
        let pipeline = series([
            recorder(&log, "t1", false),
            recorder(&log, "t2", true),
            recorder(&log, "t3", false),
        ])
        .with_name("pipeline");

        let err = run_task(&pipeline, &env()).unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2"]);
        match err {
            RunError::Failed {
                task,
                diagnostics,
                source,
            } => {
                assert_eq!(task, "t2");
                assert_eq!(source.downcast_ref::<Broken>().unwrap().0, "t2");
                assert_eq!(diagnostics.order(), vec!["t1", "t2", "pipeline"]);
                assert!(diagnostics.get("pipeline").unwrap().failed);
                assert!(diagnostics.get("t3").is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nested_series() {
        let log = Log::default();
        let inner = series([recorder(&log, "b", false), recorder(&log, "c", false)]);
        let pipeline = series([recorder(&log, "a", false), inner, recorder(&log, "d", false)]);

        run_task(&pipeline, &env()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_empty_series_succeeds() {
        let diagnostics = run_task(&series(Vec::new()), &env()).unwrap();
        assert!(diagnostics.executions.is_empty());
    }

    #[test]
    fn test_panic_becomes_error() {
        let log = Log::default();
        let pipeline = series([
            Task::named("explodes", |_| panic!("boom")),
            recorder(&log, "after", false),
        ]);

        let err = run_task(&pipeline, &env()).unwrap_err();

        assert!(log.lock().unwrap().is_empty());
        let RunError::Failed { task, source, .. } = err else {
            panic!("expected a task failure");
        };
        assert_eq!(task, "explodes");
        assert_eq!(source.to_string(), "Task panicked: boom");
    }

    #[test]
    fn test_actions_see_environment() {
        let seen = Arc::new(Mutex::new(None));
        let task = {
            let seen = seen.clone();
            Task::named("peek", move |ctx| {
                ctx.set_message("peeking");
                *seen.lock().unwrap() = Some(ctx.env.root.clone());
                Ok(())
            })
        };

        run_task(&task, &env()).unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some(camino::Utf8Path::new("/nonexistent")));
    }
}

use std::fmt::Write;
use std::time::Duration;

use crate::engine::runner::TaskExecution;
use crate::engine::{Task, TaskGraph};

/// Build diagnostics and performance metrics.
///
/// Returned by [`run_task`](crate::run_task) and carried by
/// [`RunError::Failed`](crate::RunError::Failed). Holds one entry per named
/// task that finished, successfully or not, in completion order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub executions: Vec<TaskExecution>,
}

impl Diagnostics {
    pub fn get(&self, name: &str) -> Option<&TaskExecution> {
        self.executions.iter().find(|execution| execution.name == name)
    }

    /// Names of the finished tasks in completion order.
    pub fn order(&self) -> Vec<&str> {
        self.executions
            .iter()
            .map(|execution| execution.name.as_str())
            .collect()
    }

    pub fn total(&self) -> Duration {
        let Some(first) = self.executions.iter().map(|e| e.start).min() else {
            return Duration::ZERO;
        };

        self.executions
            .iter()
            .map(|e| (e.start + e.duration).duration_since(first))
            .max()
            .unwrap_or_default()
    }

    /// Plain text report, one line per task.
    pub fn summary(&self) -> String {
        let width = self
            .executions
            .iter()
            .map(|e| e.name.len())
            .max()
            .unwrap_or(0);

        let mut f = String::new();
        for execution in &self.executions {
            let status = if execution.failed { "failed" } else { "ok" };
            let duration = format!("{:.2?}", execution.duration);
            let _ = writeln!(f, "{:<width$}  {duration:>10}  {status}", execution.name);
        }
        let total = format!("{:.2?}", self.total());
        let _ = write!(f, "{:<width$}  {total:>10}", "total");

        f
    }

    /// Renders the task tree as a Mermaid diagram, color-coded by execution
    /// duration.
    ///
    /// * **Green**: Fast
    /// * **Yellow**: Moderate
    /// * **Red**: Slow
    /// * **Gray**: Failed
    /// * **Blue**: Never reached
    pub fn render_mermaid(&self, task: &Task) -> String {
        let mut min_time = f64::MAX;
        let mut max_time = f64::MIN;

        for execution in &self.executions {
            let secs = execution.duration.as_secs_f64();
            min_time = min_time.min(secs);
            max_time = max_time.max(secs);
        }

        if min_time > max_time {
            // Nothing ran
            min_time = 0.0;
            max_time = 0.0;
        }

        // Avoid divide by zero if all tasks took same time
        if (max_time - min_time).abs() < f64::EPSILON {
            max_time = min_time + 1.0;
        }

        let mut f = String::new();
        let graph = TaskGraph::from_tasks([task]);

        let _ = graph.write_mermaid(&mut f, |node| {
            if !node.named {
                return None;
            }

            let Some(execution) = self.get(&node.label) else {
                return Some(("Skipped".to_string(), "#ADD8E6".to_string()));
            };

            let duration = format!("{:.2?}", execution.duration);

            if execution.failed {
                return Some((format!("{duration} failed"), "#A9A9A9".to_string()));
            }

            // 0.0 (Green) -> 0.5 (Yellow) -> 1.0 (Red)
            let t = (execution.duration.as_secs_f64() - min_time) / (max_time - min_time);

            let (r, g, b) = if t < 0.5 {
                ((255.0 * t * 2.0) as u8, 255, 0)
            } else {
                (255, (255.0 * (1.0 - (t - 0.5) * 2.0)) as u8, 0)
            };

            Some((duration, format!("#{r:02X}{g:02X}{b:02X}")))
        });

        f
    }
}

use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::engine::Task;
use crate::error::StepError;
use crate::utils::as_overhead;

/// Removes `dir` (relative to the root) and everything inside it. A missing
/// directory is not an error, so running the task twice is fine.
pub fn rimraf(dir: impl Into<Utf8PathBuf>) -> Task {
    let dir = dir.into();
    let name = format!("clean-{}", dir.file_name().unwrap_or(dir.as_str()));

    Task::named(name, move |ctx| {
        remove_dir(&ctx.env.path(&dir))?;
        Ok(())
    })
}

pub(crate) fn remove_dir(path: &Utf8Path) -> Result<(), StepError> {
    let s = Instant::now();

    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::info!("removed {path} {}", as_overhead(s));
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("{path} doesn't exist, nothing to remove");
            Ok(())
        }
        Err(source) => Err(StepError::Clear {
            path: path.to_owned(),
            source,
        }),
    }
}

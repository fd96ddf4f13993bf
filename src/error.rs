use camino::Utf8PathBuf;
use thiserror::Error;

use crate::engine::Diagnostics;
use crate::hygiene::Mismatch;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Task '{0}' is already defined")]
    Duplicate(String),

    #[error("Task '{0}' is not defined")]
    NotFound(String),
}

/// Problems with startup inputs: `kumitate.json`, product metadata and the
/// package manifests read by the hygiene check.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read '{path}'")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in '{path}'")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON object in '{0}'")]
    NotAnObject(Utf8PathBuf),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Failure reported by an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Couldn't start '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully. `output` is its stdout followed by its
    /// stderr, each decoded as lossy UTF-8.
    #[error("'{program}' failed ({}):\n{output}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => String::from("terminated by signal"),
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Couldn't remove '{path}'")]
    Clear {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't write '{path}'")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HygieneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Found {} dependency mismatch(es):\n{}", .0.len(), list_mismatches(.0))]
    Mismatches(Vec<Mismatch>),
}

fn list_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|mismatch| format!("  - {mismatch}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A task failed. `source` is the error returned by the failing action,
    /// untouched; `diagnostics` covers everything that ran up to that point.
    #[error("Task '{task}' failed")]
    Failed {
        task: String,
        diagnostics: Diagnostics,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    /// Diagnostics collected before the failure, if any task ran at all.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            RunError::Registry(_) => None,
            RunError::Failed { diagnostics, .. } => Some(diagnostics),
        }
    }
}

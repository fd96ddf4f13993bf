use std::process::{Command, Stdio};

use camino::Utf8Path;
use serde::Deserialize;

use crate::bootstrap::{ENV_CLI, ENV_CWD};
use crate::error::ToolError;
use crate::hygiene::Linter;
use crate::steps::{CompileRequest, Compiler, OptimizeRequest, Optimizer};

/// An external program invoked by a build step.
///
/// The step-specific flags are appended after `args`:
///
/// * compile: `--src <src> --out <dst> [--build] [--disable-mangle]`
/// * optimize: `--src <src> --out <dst> [--inline]`
/// * lint: `--root <root>`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalTool {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A node script relative to the repository root.
    pub fn node(script: &str) -> Self {
        Self::new("node", [script])
    }

    /// Runs the tool from `root` with `extra` appended, capturing both output
    /// streams. On failure the captured text is returned as stdout followed by
    /// stderr.
    pub fn invoke(&self, root: &Utf8Path, extra: &[String]) -> Result<(), ToolError> {
        tracing::debug!("running {} {} {}", self.program, self.args.join(" "), extra.join(" "));

        let output = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .current_dir(root)
            .env_remove(ENV_CWD)
            .env(ENV_CLI, "1")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                output: text,
            });
        }

        if !text.trim().is_empty() {
            tracing::debug!("{}: {}", self.program, text.trim_end());
        }

        Ok(())
    }
}

impl Compiler for ExternalTool {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), ToolError> {
        let mut extra = vec![
            "--src".to_string(),
            request.src.to_string(),
            "--out".to_string(),
            request.dst.to_string(),
        ];
        if request.build {
            extra.push("--build".to_string());
        }
        if request.options.disable_mangle {
            extra.push("--disable-mangle".to_string());
        }

        self.invoke(request.root, &extra)
    }
}

impl Optimizer for ExternalTool {
    fn optimize(&self, request: &OptimizeRequest<'_>) -> Result<(), ToolError> {
        let mut extra = vec![
            "--src".to_string(),
            request.src.to_string(),
            "--out".to_string(),
            request.dst.to_string(),
        ];
        if request.inline {
            extra.push("--inline".to_string());
        }

        self.invoke(request.root, &extra)
    }
}

impl Linter for ExternalTool {
    fn lint(&self, root: &Utf8Path) -> Result<(), ToolError> {
        self.invoke(root, &["--root".to_string(), root.to_string()])
    }
}

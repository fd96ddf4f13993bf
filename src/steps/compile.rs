use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::engine::Task;
use crate::error::{StepError, ToolError};
use crate::utils::as_overhead;

/// Knobs of a single compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Keep identifier names as written instead of mangling them.
    pub disable_mangle: bool,
}

/// What a [`Compiler`] is asked to do. Paths are absolute.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub root: &'a Utf8Path,
    pub src: &'a Utf8Path,
    pub dst: &'a Utf8Path,
    /// Full build, with localization bundles and source maps.
    pub build: bool,
    pub options: CompileOptions,
}

/// Type-checks and transpiles a source tree into an output tree.
///
/// Implementations succeed only when the compiler reported no errors, and on
/// failure return the diagnostics exactly as the compiler printed them.
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), ToolError>;
}

/// Compiles `src` into `dst` (both relative to the root) with the given
/// compiler. The task is named `compile-<src>-into-<dst>`.
pub fn compile_task(
    compiler: Arc<dyn Compiler>,
    src: impl Into<Utf8PathBuf>,
    dst: impl Into<Utf8PathBuf>,
    build: bool,
    options: CompileOptions,
) -> Task {
    let src = src.into();
    let dst = dst.into();
    let name = format!("compile-{src}-into-{dst}");

    Task::named(name, move |ctx| {
        let s = Instant::now();
        let src = ctx.env.path(&src);
        let dst = ctx.env.path(&dst);

        ctx.set_message(&format!("Compiling {src}"));

        let request = CompileRequest {
            root: &ctx.env.root,
            src: &src,
            dst: &dst,
            build,
            options,
        };

        compiler.compile(&request).map_err(StepError::from)?;

        let mangle = if options.disable_mangle { "off" } else { "on" };
        tracing::info!("compiled {src} into {dst}, mangling {mangle} {}", as_overhead(s));

        Ok(())
    })
}

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::core::{Environment, Hash32};
use crate::engine::Task;
use crate::error::{StepError, ToolError};
use crate::utils::{as_overhead, digest_tree, write_if_changed};

/// What an [`Optimizer`] is asked to do. Paths are absolute.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeRequest<'a> {
    pub root: &'a Utf8Path,
    pub src: &'a Utf8Path,
    pub dst: &'a Utf8Path,
    /// Inline every module into its entry bundle.
    pub inline: bool,
}

/// Bundles and minifies the loader-relative output of a compilation.
pub trait Optimizer: Send + Sync {
    fn optimize(&self, request: &OptimizeRequest<'_>) -> Result<(), ToolError>;
}

/// Optimizes `src` into `dst`, both relative to the root.
///
/// A successful pass stamps a digest of the `dst` tree, and of the `src` tree
/// when the two differ, into the cache directory. When both still match the
/// stamp on the next run the optimizer isn't invoked at all.
pub fn optimize_loader_task(
    optimizer: Arc<dyn Optimizer>,
    src: impl Into<Utf8PathBuf>,
    dst: impl Into<Utf8PathBuf>,
    inline: bool,
) -> Task {
    let src = src.into();
    let dst = dst.into();

    Task::named("optimize-loader", move |ctx| {
        let s = Instant::now();
        let stamp = stamp_path(ctx.env, &src, &dst, inline);
        let src = ctx.env.path(&src);
        let dst = ctx.env.path(&dst);

        let current = fingerprint(&src, &dst)?;
        if read_stamp(&stamp).is_some_and(|stamped| stamped == current.to_hex()) {
            tracing::info!("{dst} is already optimized, skipping");
            return Ok(());
        }

        ctx.set_message(&format!("Optimizing {dst}"));

        let request = OptimizeRequest {
            root: &ctx.env.root,
            src: &src,
            dst: &dst,
            inline,
        };

        optimizer.optimize(&request).map_err(StepError::from)?;

        let digest = fingerprint(&src, &dst)?;
        write_if_changed(&stamp, &digest.to_hex())?;

        tracing::info!("optimized {dst} {}", as_overhead(s));
        Ok(())
    })
}

fn stamp_path(env: &Environment, src: &Utf8Path, dst: &Utf8Path, inline: bool) -> Utf8PathBuf {
    let key = format!("{src}\0{dst}\0{inline}");
    env.cache_dir
        .join("optimize")
        .join(Hash32::hash(key).to_hex())
}

/// Digest of the trees an optimizer pass depends on.
fn fingerprint(src: &Utf8Path, dst: &Utf8Path) -> Result<Hash32, StepError> {
    let dst_digest = digest_tree(dst)?;
    if src == dst {
        return Ok(dst_digest);
    }

    let src_digest = digest_tree(src)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(src_digest.as_bytes());
    hasher.update(dst_digest.as_bytes());
    Ok(hasher.finalize().into())
}

fn read_stamp(path: &Utf8Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|text| text.trim().to_string())
}

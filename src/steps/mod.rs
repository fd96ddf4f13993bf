//! Build steps: constructors returning named [`Task`](crate::Task)s.
//!
//! Steps that wrap an external tool take it as a [`Compiler`] or
//! [`Optimizer`].
mod clean;
mod compile;
mod optimize;
mod proposals;
mod web_paths;

pub use clean::rimraf;
pub use compile::{CompileOptions, CompileRequest, Compiler, compile_task};
pub use optimize::{OptimizeRequest, Optimizer, optimize_loader_task};
pub use proposals::{PROPOSALS_DIR, PROPOSALS_OUTPUT, Proposal, compile_api_proposal_names};
pub use web_paths::{WEB_MANIFEST, WEB_PATHS_OUTPUT, build_web_node_paths};

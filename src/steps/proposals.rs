use std::fmt::Write;
use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::engine::Task;
use crate::error::StepError;
use crate::utils::{as_overhead, write_if_changed};

/// Directory holding the proposed API declarations, relative to the root.
pub const PROPOSALS_DIR: &str = "src/vs-dts";
/// Generated registry source, relative to the root.
pub const PROPOSALS_OUTPUT: &str = "src/vs/platform/extensions/common/extensionsApiProposals.ts";

const PREFIX: &str = "vs.proposed.";
const SUFFIX: &str = ".d.ts";

/// A proposed API found in [`PROPOSALS_DIR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub name: String,
    /// Declaration file, relative to the root.
    pub path: Utf8PathBuf,
    /// Value of a `// version: N` line, if the declaration has one.
    pub version: Option<u32>,
}

/// Regenerates the proposal registry from the `vs.proposed.*.d.ts` files.
/// The output is only rewritten when its content changes.
pub fn compile_api_proposal_names() -> Task {
    Task::named("compile-api-proposal-names", |ctx| {
        let s = Instant::now();

        let proposals = scan_proposals(&ctx.env.root)?;
        let output = ctx.env.path(PROPOSALS_OUTPUT);

        if write_if_changed(&output, &render(&proposals))? {
            tracing::info!("generated {} api proposals {}", proposals.len(), as_overhead(s));
        } else {
            tracing::debug!("{PROPOSALS_OUTPUT} is up to date");
        }

        Ok(())
    })
}

pub(crate) fn scan_proposals(root: &Utf8Path) -> Result<Vec<Proposal>, StepError> {
    let pattern = format!(
        "{}/{PROPOSALS_DIR}/{PREFIX}*{SUFFIX}",
        glob::Pattern::escape(root.as_str())
    );

    let mut proposals = Vec::new();

    for entry in glob::glob(&pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;

        let Some(name) = path
            .file_name()
            .and_then(|file| file.strip_prefix(PREFIX))
            .and_then(|file| file.strip_suffix(SUFFIX))
            .map(str::to_string)
        else {
            continue;
        };

        let text = fs::read_to_string(&path)?;
        let relative = path.strip_prefix(root).unwrap_or(&path).to_owned();

        proposals.push(Proposal {
            name,
            path: relative,
            version: parse_version(&text),
        });
    }

    proposals.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(proposals)
}

fn parse_version(text: &str) -> Option<u32> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("//")?.trim_start();
        let rest = rest.strip_prefix("version")?.trim_start();
        rest.strip_prefix(':')?.trim().parse().ok()
    })
}

fn render(proposals: &[Proposal]) -> String {
    let mut f = String::new();

    let _ = writeln!(f, "// Generated by kumitate from {PROPOSALS_DIR}. Do not edit.");
    let _ = writeln!(f);
    let _ = writeln!(f, "const _allApiProposals = {{");
    for proposal in proposals {
        let _ = writeln!(f, "\t{}: {{", proposal.name);
        let _ = writeln!(f, "\t\tproposal: '{}',", proposal.path);
        if let Some(version) = proposal.version {
            let _ = writeln!(f, "\t\tversion: {version}");
        }
        let _ = writeln!(f, "\t}},");
    }
    let _ = writeln!(f, "}};");
    let _ = writeln!(
        f,
        "export const allApiProposals = Object.freeze<{{ [proposalName: string]: Readonly<{{ proposal: string; version?: number }}> }}>(_allApiProposals);"
    );
    let _ = writeln!(f, "export type ApiProposalName = keyof typeof _allApiProposals;");

    f
}

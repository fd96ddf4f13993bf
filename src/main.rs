use std::error::Error;
use std::fs;
use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use console::style;
use kumitate::{CONFIG_FILE, Config, Environment, RunError, Toolchain};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Repository root.
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Configuration file, defaults to `kumitate.json` in the root.
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run a task by name.
    Run {
        task: String,
        /// Write a Mermaid graph of task timings to this file.
        #[arg(long)]
        diagnostics: Option<Utf8PathBuf>,
    },
    /// List the registered tasks.
    List,
    /// Print the task graph as Mermaid.
    Graph,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    kumitate::init_logging()?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.root.join(CONFIG_FILE));
    let config = Config::load(&config_path)?;
    let toolchain = Toolchain::from_config(&config);
    let registry = kumitate::standard_registry(&config, &toolchain)?;

    match args.command {
        Command::List => {
            for name in registry.names() {
                println!("{name}");
            }
        }
        Command::Graph => print!("{registry}"),
        Command::Run { task, diagnostics } => {
            let env = Environment::from_process(&args.root, config)?;

            eprintln!(
                "Running {} task {}.",
                style("kumitate").red(),
                style(&task).blue()
            );

            let result = registry.run(&task, &env);

            if let Some(path) = diagnostics {
                let timings = match &result {
                    Ok(diagnostics) => Some(diagnostics),
                    Err(err) => err.diagnostics(),
                };

                if let Some(timings) = timings {
                    let graph = timings.render_mermaid(registry.get(&task)?);
                    fs::write(&path, graph).with_context(|| format!("Couldn't write '{path}'"))?;
                }
            }

            match result {
                Ok(diagnostics) => eprintln!("{}", diagnostics.summary()),
                Err(err @ RunError::Failed { .. }) => {
                    report(&err);
                    return Ok(ExitCode::FAILURE);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Prints the error and then every cause, unindented.
fn report(err: &dyn Error) {
    eprintln!("{} {err}", style("error:").red().bold());

    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("{cause}");
        source = cause.source();
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! `rigkit` - build rigs from RON descriptions and inspect saved documents.
//!
//! ## Commands
//!
//! - `build <rig.ron>` assembles every rig node of a description into a
//!   fresh in-memory graph and prints a summary (`--json` for a full
//!   report, `--save <doc.ron>` to keep the document)
//! - `inspect <doc.ron>` rehydrates every rig root of a saved document
//!
//! Logging is controlled through `RUST_LOG`.

mod report;

use clap::{Parser, Subcommand};
use rigkit_graph::{Graph, GraphError};
use rigkit_rig::{assemble, RigConfig, RigContext, RigDescription, RigError, RigRegistry};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Rig(#[from] RigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON report failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rigkit", version, about = "Procedural rig construction")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and connect every rig node of a description.
    Build(BuildArgs),
    /// Rehydrate and report the rig nodes of a saved document.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Rig description (RON).
    description: PathBuf,

    /// Configuration overriding the one embedded in the description.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write the resulting document (RON).
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Saved document (RON).
    document: PathBuf,

    /// Print the full report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn read(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rig".to_string())
}

fn print_report(graph: &Graph, name: &str, json: bool) -> Result<(), AppError> {
    let report = report::collect(graph, name, &RigRegistry::with_builtin())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary(graph)?);
    }
    Ok(())
}

fn cmd_build(args: BuildArgs) -> Result<(), AppError> {
    let description = RigDescription::from_ron(&read(&args.description)?)?;
    let config = match &args.config {
        Some(path) => RigConfig::from_ron(&read(path)?).map_err(RigError::from)?,
        None => description.config(),
    };
    let name = document_name(&args.description);
    let registry = RigRegistry::with_builtin();

    let mut graph = Graph::new(&name);
    {
        let mut ctx = RigContext::new(&mut graph, &config);
        assemble(&mut ctx, &registry, &description)?;
    }
    print_report(&graph, &name, args.json)?;

    if let Some(path) = &args.save {
        std::fs::write(path, graph.to_ron()?).map_err(|source| AppError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Saved document to {}", path.display());
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<(), AppError> {
    let graph = Graph::from_ron(&read(&args.document)?)?;
    print_report(&graph, &graph.name, args.json)
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Build(args) => cmd_build(args),
        Command::Inspect(args) => cmd_inspect(args),
    };
    if let Err(e) = result {
        tracing::error!("rigkit failed: {e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

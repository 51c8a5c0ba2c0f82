//! constrep command-line tool.
//!
//! Provides the `constrep` binary for running graph passes over graphs stored
//! as JSON `GraphDef` files.
//!
//! Settings not given as flags fall back to environment variables:
//! - `CONSTREP_MAX_ELEMENTS`: largest constant to replicate (default: 16)
//! - `CONSTREP_DUMP_DIR`: directory for before/after graph dumps

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::Level;

use constrep_core::{Graph, GraphDef};
use constrep_pass::{GraphPass, PassError, PassOptions, ReplicateConstantsConfig, ReplicateConstantsPass};

/// Graph rewrite tools.
#[derive(Parser)]
#[command(name = "constrep", about = "Device-aware graph rewrite tools")]
struct Cli {
    /// Log pass decisions at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Replicate small constants onto every host that consumes them.
    Replicate {
        /// Input graph (JSON GraphDef).
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the rewritten graph. Only the report is printed
        /// when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Largest constant, in elements, to replicate.
        #[arg(long)]
        max_elements: Option<i64>,

        /// Directory for before/after graph dumps.
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },

    /// Print a graph one node per line.
    Show {
        /// Input graph (JSON GraphDef).
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let exit_code = match cli.command {
        Commands::Replicate {
            input,
            output,
            max_elements,
            dump_dir,
        } => run_replicate(&input, output.as_deref(), max_elements, dump_dir),
        Commands::Show { input } => run_show(&input),
    };
    process::exit(exit_code);
}

/// Execute the replicate subcommand.
///
/// Returns exit code: 0 = success, 1 = pass failure, 2 = invalid input,
/// 3 = I/O error.
fn run_replicate(
    input: &Path,
    output: Option<&Path>,
    max_elements: Option<i64>,
    dump_dir: Option<PathBuf>,
) -> i32 {
    let config = match resolve_config(max_elements, dump_dir, |key| std::env::var(key).ok()) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return 2;
        }
    };

    let mut graph = match load_graph(input) {
        Ok(g) => g,
        Err(code) => return code,
    };

    let pass = ReplicateConstantsPass::new(config);
    let report = match pass.run(PassOptions::new(&mut graph)) {
        Ok(report) => report,
        Err(e @ PassError::Graph(_)) => {
            eprintln!("internal error: {}", e);
            return 1;
        }
        Err(e) => {
            eprintln!("error: {} failed: {}", pass.name(), e);
            return 1;
        }
    };

    if let Some(output) = output {
        let json = match graph.to_graph_def().and_then(|def| def.to_json_pretty()) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("error: failed to encode rewritten graph: {}", e);
                return 1;
            }
        };
        if let Err(e) = std::fs::write(output, json) {
            eprintln!("error: failed to write '{}': {}", output.display(), e);
            return 3;
        }
    }

    // Report as JSON on stdout for machine-readable output.
    let json = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {}\"}}", e));
    println!("{}", json);
    0
}

/// Execute the show subcommand.
fn run_show(input: &Path) -> i32 {
    let graph = match load_graph(input) {
        Ok(g) => g,
        Err(code) => return code,
    };
    match graph.to_graph_def() {
        Ok(def) => {
            print!("{}", def);
            0
        }
        Err(e) => {
            eprintln!("error: {}", e);
            2
        }
    }
}

/// Reads and validates a graph, printing the failure and returning the exit
/// code on error.
fn load_graph(path: &Path) -> Result<Graph, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    GraphDef::from_json(&text)
        .and_then(|def| Graph::from_graph_def(&def))
        .map_err(|e| {
            eprintln!("error: invalid graph '{}': {}", path.display(), e);
            2
        })
}

/// Combines flags with environment fallbacks. Flags win; `env` looks up
/// `CONSTREP_*` variables.
fn resolve_config(
    max_elements: Option<i64>,
    dump_dir: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ReplicateConstantsConfig, String> {
    let mut config = ReplicateConstantsConfig::default();

    match max_elements {
        Some(n) => config.max_elements = n,
        None => {
            if let Some(raw) = env("CONSTREP_MAX_ELEMENTS") {
                config.max_elements = raw.trim().parse().map_err(|_| {
                    format!("invalid CONSTREP_MAX_ELEMENTS '{}', expected an integer", raw)
                })?;
            }
        }
    }

    config.dump_dir = dump_dir.or_else(|| env("CONSTREP_DUMP_DIR").map(PathBuf::from));

    if config.max_elements < 0 {
        return Err(format!(
            "max elements must be non-negative, got {}",
            config.max_elements
        ));
    }
    Ok(config)
}

use clap::{Parser, Subcommand, ValueEnum};
use lpweave_model::{IdAllocator, Model, ModelSpec, Solver, SolverConfig, Variable};
use lpweave_solver::SimplexBackend;
use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lpweave")]
#[command(about = "Compile and solve LP/MIP models in the lpweave exchange format", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a model and print the solution
    Solve {
        /// The model file (JSON)
        file: PathBuf,
        /// Solve the continuous relaxation even if integer columns exist
        #[arg(long)]
        relax: bool,
        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Import and compile a model, then print its size
    Check {
        /// The model file (JSON)
        file: PathBuf,
    },
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> T {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => fail(&format!("Error reading {what} {}", path.display()), e),
    };
    match serde_json::from_str(&source) {
        Ok(value) => value,
        Err(e) => fail(&format!("Invalid {what}"), e),
    }
}

fn import(file: &Path) -> (Model, Vec<Variable>) {
    let spec: ModelSpec = read_json(file, "model");
    match Model::from_spec(&IdAllocator::new(), &spec) {
        Ok(imported) => {
            debug!(component = "cli", operation = "import", file = %file.display());
            imported
        }
        Err(e) => fail("Import error", e),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            file,
            relax,
            config,
            format,
        } => {
            let config: SolverConfig = match &config {
                Some(path) => read_json(path, "config"),
                None => SolverConfig::default(),
            };
            let (model, variables) = import(&file);
            let solver = Solver::with_config(&model, SimplexBackend::new(), config);
            if let Err(e) = solver.solve(relax) {
                fail(&format!("Solve error [{}]", e.code()), e);
            }

            let status = solver.status();
            let constraints = model.constraints();
            match format {
                Format::Json => {
                    let output = json!({
                        "model": model.name(),
                        "status": format!("{:?}", status.status),
                        "objective": solver.objective_value(),
                        "iterations": status.iterations,
                        "nodes": status.nodes,
                        "variables": variables.iter().map(|v| json!({
                            "name": v.name(),
                            "value": v.value(),
                            "reduced_cost": v.reduced_cost(),
                        })).collect::<Vec<_>>(),
                        "constraints": constraints.iter().map(|c| json!({
                            "name": c.name(),
                            "activity": c.value(),
                            "price": c.price(),
                        })).collect::<Vec<_>>(),
                    });
                    match serde_json::to_string_pretty(&output) {
                        Ok(text) => println!("{text}"),
                        Err(e) => fail("Error writing output", e),
                    }
                }
                Format::Text => {
                    println!("Model: {}", model.name());
                    println!("Status: {:?}", status.status);
                    if !status.is_proven_optimal() {
                        println!("No optimal solution was found.");
                        std::process::exit(1);
                    }
                    println!("Objective: {:.6}", solver.objective_value());
                    println!("Iterations: {}  Nodes: {}", status.iterations, status.nodes);
                    println!();
                    println!("Variables:");
                    for v in &variables {
                        println!("  {:20} {:14.6} {:14.6}", v.name(), v.value(), v.reduced_cost());
                    }
                    println!();
                    println!("Constraints:");
                    for c in &constraints {
                        println!("  {:20} {:14.6} {:14.6}", c.name(), c.value(), c.price());
                    }
                }
            }
            if matches!(format, Format::Json) && !status.is_proven_optimal() {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let (model, _) = import(&file);
            let solver = Solver::new(&model, SimplexBackend::new());
            if let Err(e) = solver.generate() {
                fail(&format!("Generate error [{}]", e.code()), e);
            }
            println!("{}", solver.statistics_report());
        }
    }
}

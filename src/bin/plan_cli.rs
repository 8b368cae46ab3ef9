//! Execution Plan Command Line Interface
//!
//! Compiles onboarding DSL into an execution plan and prints it.
//!
//! # Usage
//!
//! ```bash
//! # Compile DSL from stdin
//! echo '(kyc.start)' | plan_cli compile
//!
//! # Compile a file with a custom configuration, as JSON
//! plan_cli compile --file case.dsl --config config/planner.yaml --format json
//!
//! # List registry verbs for one domain
//! plan_cli verbs --domain kyc
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ob_execution_planner::{
    describe_plan, ConfigLoader, DiagnosticKind, ExecutionPlan, PlanCompiler, PlannerConfig,
};

#[derive(Parser)]
#[command(name = "plan_cli")]
#[command(version = "0.1.0")]
#[command(about = "Compile onboarding DSL into phased execution plans")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Planner configuration file (YAML overlay over the built-in catalog)
    #[arg(long, short, global = true, env = "PLANNER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile DSL into an execution plan
    Compile {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Session id stamped on the plan (random if not provided)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List registry verbs
    Verbs {
        /// Filter by domain, e.g. kyc, ubo, resources
        #[arg(short, long)]
        domain: Option<String>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.clone()).and_then(|config| match cli.command {
        Commands::Compile { file, session } => cmd_compile(config, file, session, cli.format),
        Commands::Verbs { domain } => cmd_verbs(&config, domain, cli.format),
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": e }));
            } else {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_compile(
    config: PlannerConfig,
    file: Option<PathBuf>,
    session: Option<String>,
    format: OutputFormat,
) -> Result<(), String> {
    let source = read_input(file)?;
    let session = session.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));

    let plan = PlanCompiler::with_config(config)
        .map_err(|e| e.to_string())?
        .compile(&source, &session)
        .map_err(|e| e.to_string())?;

    match format {
        OutputFormat::Json => {
            let json = plan
                .to_json_pretty()
                .map_err(|e| format!("JSON serialization failed: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", describe_plan(&plan)),
        OutputFormat::Pretty => print_pretty(&plan),
    }

    Ok(())
}

fn print_pretty(plan: &ExecutionPlan) {
    let metrics = &plan.optimization_metrics;
    println!(
        "{} {} operation(s) in {} phase(s)",
        "OK".green(),
        plan.total_operations,
        plan.phases.len()
    );
    println!(
        "  {} {}ms (sequential {}ms, {:.1}% faster)",
        "duration:".dimmed(),
        plan.estimated_duration_ms,
        metrics.original_duration_ms,
        metrics.improvement_percent
    );
    println!();

    for phase in &plan.phases {
        let mode = if phase.parallelizable {
            "parallel".cyan()
        } else {
            "sequential".yellow()
        };
        println!(
            "{} [{}] {}ms",
            format!("Phase {}", phase.ordinal).bold(),
            mode,
            phase.estimated_duration_ms
        );
        for op in &phase.operations {
            let id = if op.on_critical_path {
                op.id.red().bold()
            } else {
                op.id.normal()
            };
            println!("  {} {}", id, op.describe());
        }
        for point in plan
            .synchronization_points
            .iter()
            .filter(|p| p.after_phase == phase.ordinal)
        {
            println!(
                "  {} {}",
                "sync".magenta(),
                point.wait_for.join(", ").dimmed()
            );
        }
    }

    if !plan.resource_order.is_empty() {
        println!();
        println!(
            "{} {}",
            "resources:".dimmed(),
            plan.resource_order.join(" -> ")
        );
    }

    for diagnostic in &plan.diagnostics {
        let tag = match diagnostic.kind {
            DiagnosticKind::ParseSkip => "skip".dimmed(),
            DiagnosticKind::UnknownResourceType => "warning".yellow(),
        };
        eprintln!("{}: {}", tag, diagnostic.message);
    }
}

fn cmd_verbs(
    config: &PlannerConfig,
    domain: Option<String>,
    format: OutputFormat,
) -> Result<(), String> {
    let verbs: Vec<_> = config
        .verbs
        .iter()
        .filter(|(name, _)| match &domain {
            Some(d) => name.starts_with(&format!("{}.", d)),
            None => true,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let output: serde_json::Map<String, serde_json::Value> = verbs
                .iter()
                .map(|(name, spec)| {
                    let value = serde_json::to_value(spec).unwrap_or(serde_json::Value::Null);
                    (name.to_string(), value)
                })
                .collect();
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("JSON serialization failed: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            for (name, spec) in verbs {
                let duration = config.operation_duration(name);
                println!("  {} {}ms", name.green().bold(), duration);
                if !spec.depends_on.is_empty() {
                    println!("    after: {}", spec.depends_on.join(", ").dimmed());
                }
                if !spec.produces.is_empty() {
                    println!("    produces: {}", spec.produces.join(", ").dimmed());
                }
                if let Some(resource) = &spec.resource_type {
                    println!("    creates: {}", resource.cyan());
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn load_config(path: Option<PathBuf>) -> Result<PlannerConfig, String> {
    match path {
        Some(path) => ConfigLoader::new(path)
            .load()
            .map_err(|e| format!("{:#}", e)),
        None => Ok(PlannerConfig::default()),
    }
}

fn read_input(file: Option<PathBuf>) -> Result<String, String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e)),
        None => {
            if io::stdin().is_terminal() {
                return Err("No input provided. Use --file or pipe input via stdin.".to_string());
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(buffer)
        }
    }
}

//! Headless Epoch Runner
//!
//! Runs a number of epochs and reports the per-epoch summaries as JSON or a
//! text table.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use genesis_sim::brain::PolicyKind;
use genesis_sim::core::{Result, SimulationConfig};
use genesis_sim::simulation::{EpochSummary, MetricsSnapshot, PopulationManager};
use serde::Serialize;

/// Headless Epoch Runner - evolve a population without rendering
#[derive(Parser, Debug)]
#[command(name = "epoch_runner")]
#[command(about = "Run simulation epochs and output evolution metrics")]
struct Args {
    /// TOML config file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of epochs to run
    #[arg(long, default_value_t = 5)]
    epochs: u32,

    /// Random seed, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Let the neural network pick actions instead of the Q-table
    #[arg(long)]
    neural: bool,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Default, Serialize)]
struct RunReport {
    seed: u64,
    epochs: Vec<EpochSummary>,
    final_metrics: MetricsSnapshot,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("genesis_sim=info")
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.neural {
        config.policy = PolicyKind::Neural;
    }

    tracing::info!("Running {} epochs (seed {}, {:?} policy)", args.epochs, config.seed, config.policy);

    let seed = config.seed;
    let mut manager = PopulationManager::new(config)?;
    for _ in 0..args.epochs {
        manager.run_epoch()?;
    }

    let report = RunReport {
        seed,
        epochs: manager.epoch_history().to_vec(),
        final_metrics: manager.metrics(),
    };

    let rendered = render(&report, args.format)?;
    emit(&rendered, args.output.as_deref())
}

/// Write to `output` when given, stdout otherwise
fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Format the report; the result always ends with a newline
fn render(report: &RunReport, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        Format::Text => {
            let mut out =
                String::from("Epoch  Steps  Alive  Lived  Births  Deaths  Lifespan  Offspring  Diversity\n");
            for e in &report.epochs {
                // writing into a String cannot fail
                let _ = writeln!(
                    out,
                    "{:>5}  {:>5}  {:>5}  {:>5}  {:>6}  {:>6}  {:>8.1}  {:>9.2}  {:>9.3}",
                    e.epoch,
                    e.steps,
                    e.population_size,
                    e.lived,
                    e.births,
                    e.deaths,
                    e.average_lifespan,
                    e.average_offspring,
                    e.genetic_diversity
                );
            }
            Ok(out)
        }
    }
}

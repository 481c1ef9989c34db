//! PatternLab CLI — run pattern-validation backtests from the terminal.
//!
//! Commands:
//! - `run` — execute a simulation from a TOML config file
//! - `demo` — run a short simulation over seeded synthetic data
//!
//! Market data and the decision orchestrator are external collaborators in
//! production; the CLI substitutes the seeded synthetic provider and the
//! built-in rule-based decision source so runs are fully reproducible.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patternlab_core::data::SyntheticProvider;
use patternlab_core::engine::{NoSnapshots, RuleBasedDecision};
use patternlab_core::patterns::MemoryValidationCache;
use patternlab_runner::{run_simulation, SimulationConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "patternlab",
    about = "PatternLab CLI — pattern validation and walk-forward backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a simulation from a TOML config file.
    Run {
        /// Path to the TOML config.
        #[arg(long)]
        config: PathBuf,

        /// Seed for the synthetic market data stand-in.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run a short demo simulation over synthetic data.
    Demo {
        /// Symbols to simulate.
        #[arg(long, num_args = 1.., default_values_t = [String::from("ACME"), String::from("ZETA")])]
        symbols: Vec<String>,

        /// Simulation start date (YYYY-MM-DD).
        #[arg(long, default_value = "2023-01-02")]
        start: String,

        /// Simulation end date (YYYY-MM-DD).
        #[arg(long, default_value = "2023-12-29")]
        end: String,

        /// Initial capital.
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,

        /// Seed for the synthetic market data.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seed,
            output_dir,
        } => {
            let config = SimulationConfig::from_path(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            execute(&config, seed, &output_dir)
        }
        Commands::Demo {
            symbols,
            start,
            end,
            capital,
            seed,
            output_dir,
        } => {
            let toml = format!(
                "[simulation]\ninitial_capital = {capital}\nstart = \"{start}\"\n\
                 end = \"{end}\"\nwatchlist = {symbols:?}\nwindow_len = 120\n\
                 history_lookback = 1000\n"
            );
            let config = SimulationConfig::from_toml_str(&toml).context("building demo config")?;
            execute(&config, seed, &output_dir)
        }
    }
}

fn execute(config: &SimulationConfig, seed: u64, output_dir: &PathBuf) -> Result<()> {
    let provider = SyntheticProvider::new(seed);
    let cache = MemoryValidationCache::new();

    let report = run_simulation(
        config,
        &provider,
        &RuleBasedDecision,
        &cache,
        &NoSnapshots,
    )
    .context("simulation failed")?;

    println!("{}", report.render_markdown());

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let stem = &report.run_id[..12];
    let json_path = output_dir.join(format!("{stem}.json"));
    let csv_path = output_dir.join(format!("{stem}_trades.csv"));
    report.write_json(&json_path)?;
    report.write_trades_csv(&csv_path)?;
    println!("Artifacts: {} / {}", json_path.display(), csv_path.display());

    Ok(())
}

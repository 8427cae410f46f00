// Squad optimizer entry point.
//
// Startup sequence:
// 1. Parse arguments and initialize tracing (stderr, so stdout carries only
//    the report)
// 2. Load config
// 3. Load the player pool
// 4. Build the optimizer and the request for the chosen mode
// 5. Run the formation sweep
// 6. Print the report

use squadopt_app::config;
use squadopt_app::pool;
use squadopt_app::report::RunReport;
use squadopt_app::runner::{self, RunMode, RunOptions, SweepSettings};

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Pick the highest-scoring eleven for a budget across every formation.
#[derive(Parser, Debug)]
#[command(name = "squadopt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: config/squadopt.toml, copied from defaults/)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Player CSV, overriding [data_paths].players
    #[arg(long)]
    players: Option<PathBuf>,

    /// Budget in currency minor units, overriding [budget].default
    #[arg(long, short)]
    budget: Option<u32>,

    /// Evaluate a single formation, e.g. 4-4-2
    #[arg(long, short)]
    formation: Option<String>,

    /// Drop unfit players and use the configured fixed budget
    #[arg(long, conflicts_with_all = ["budget", "formation"])]
    fixed_budget: bool,

    /// Player ids to exclude (repeatable or comma-separated)
    #[arg(long, short = 'x', value_delimiter = ',')]
    exclude: Vec<String>,

    /// Evaluate formations one at a time regardless of config
    #[arg(long)]
    sequential: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Arguments and tracing
    let cli = Cli::parse();
    init_tracing()?;

    // 2. Config
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => config::load_config().context("failed to load configuration")?,
    };
    if let Some(path) = &cli.players {
        config.data_paths.players = path.display().to_string();
    }
    info!(
        "Config loaded: {} formations, default budget {}, fixed budget {}",
        config.formations.len(),
        config.budget.default,
        config.budget.fixed
    );

    // 3. Player pool
    let pool = pool::load_pool(&config).context("failed to load player pool")?;
    info!("Loaded {} players from {}", pool.len(), config.data_paths.players);

    // 4. Optimizer and request
    let mode = if cli.fixed_budget {
        RunMode::FixedBudget
    } else {
        RunMode::General
    };
    let options = RunOptions {
        budget: cli.budget,
        formation: cli.formation.clone(),
        exclude: cli.exclude.clone(),
    };
    let optimizer = runner::build_optimizer(&config).context("failed to build optimizer")?;
    let request = runner::build_request(mode, &config, &pool, &optimizer, &options)
        .context("failed to build optimization request")?;
    let budget = request.budget;

    let mut settings = SweepSettings::from_config(&config.optimizer);
    if cli.sequential {
        settings.parallel = false;
    }

    // 5. Sweep
    info!("Running {mode} sweep at budget {budget}");
    let outcome = runner::run(Arc::new(optimizer), request, settings).await;

    // 6. Report
    let report = RunReport::new(mode, budget, &outcome);
    if cli.json {
        println!("{}", report.to_json().context("failed to serialize report")?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(())
}

/// Initialize tracing to stderr so the report on stdout stays machine-readable.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("squadopt=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

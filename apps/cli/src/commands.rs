//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use clientintel_core::pipeline::{EnrichFileConfig, ProgressReporter, RunStats};
use clientintel_shared::{AppConfig, init_config, load_config, load_config_from, load_credentials};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ClientIntel: public-web insights for a client list.
#[derive(Parser)]
#[command(
    name = "clientintel",
    version,
    about = "Enrich a client table with public-web summaries, tags, and outreach emails.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enrich every row of a client CSV.
    Enrich(EnrichArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct EnrichArgs {
    /// Client CSV to read.
    pub input: PathBuf,

    /// Where to write the enriched CSV.
    #[arg(short, long, default_value = "enriched_clients.csv")]
    pub out: PathBuf,

    /// Search request ceiling for this run.
    #[arg(long)]
    pub max_queries: Option<u32>,

    /// Pause after each search request, in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Search by name and state only, without keyword/site filters.
    #[arg(long)]
    pub no_filters: bool,

    /// Config file to use instead of ~/.clientintel/clientintel.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write a JSON run report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl EnrichArgs {
    /// Layer command-line overrides over the loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(max) = self.max_queries {
            config.search.max_queries = max;
        }
        if let Some(delay) = self.delay_ms {
            config.search.delay_ms = delay;
        }
        if self.no_filters {
            config.pipeline.use_filters = false;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Config file to show instead of the default location.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "clientintel=info",
        1 => "clientintel=debug",
        _ => "clientintel=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich(args) => cmd_enrich(&args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show { config } => cmd_config_show(config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_enrich(args: &EnrichArgs) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    // Secrets must be present before any input is touched
    let credentials = load_credentials(&config)?;

    info!(
        input = %args.input.display(),
        output = %args.out.display(),
        max_queries = config.search.max_queries,
        filters = config.pipeline.use_filters,
        "enriching client table"
    );

    let enrich_config = EnrichFileConfig {
        input: args.input.clone(),
        output: args.out.clone(),
        report: args.report.clone(),
        app: config,
    };

    let reporter = CliProgress::new();
    let stats = clientintel_core::pipeline::enrich_file(&enrich_config, &credentials, &reporter)
        .await
        .wrap_err_with(|| format!("enrichment of {} failed", args.input.display()))?;

    print_summary(&stats, &enrich_config);
    Ok(())
}

fn print_summary(stats: &RunStats, config: &EnrichFileConfig) {
    let elapsed = stats
        .finished_at
        .map(|end| (end - stats.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();

    println!();
    println!("  Enrichment complete.");
    println!("  Run:       {}", stats.run_id);
    println!("  Records:   {}", stats.records);
    println!(
        "  Searches:  {} sent, {} failed, {} skipped (quota)",
        stats.searches_issued, stats.searches_failed, stats.quota_skipped
    );
    println!("  No data:   {}", stats.no_evidence);
    println!(
        "  Model:     {} calls, {} fallbacks ({})",
        stats.model_calls, stats.model_fallbacks, stats.model
    );
    println!("  Output:    {}", config.output.display());
    if let Some(report) = &config.report {
        println!("  Report:    {}", report.display());
    }
    println!("  Time:      {elapsed:.1}s");
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_started(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriching [{current}/{total}]"));
    }

    fn done(&self, _stats: &RunStats) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use drugwatch_core::{
    ApiResponse, DailyJob, IngestContext, ListQuery, ProgressReporter, event_detail,
    list_events, recent_withdrawals, run_daily, run_scheduler, trigger_scrape,
};
use drugwatch_scraper::{HttpFetcher, SourceRegistry, adapter_for};
use drugwatch_shared::{
    AppConfig, Clock, DataSource, DrugwatchError, ScheduleConfig, ScrapeConfig, ScrapeResult,
    SystemClock, init_config, init_config_at, load_config, load_config_from,
};
use drugwatch_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// drugwatch: track drug withdrawals, suspensions and registrations.
#[derive(Parser)]
#[command(
    name = "drugwatch",
    version,
    about = "Collect drug regulatory decisions from GIF and URPL and serve them as JSON.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.drugwatch/drugwatch.toml).
    #[arg(long, env = "DRUGWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding `storage.database_path`.
    #[arg(long, env = "DRUGWATCH_DATABASE", global = true)]
    pub database: Option<PathBuf>,

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
    /// Scrape one source now, ignoring whether today's run already happened.
    Scrape {
        /// Source to scrape: gif or urpl.
        #[arg(long, default_value = "gif")]
        source: DataSource,
    },

    /// Run the daily ingestion once (skipped if records were created today).
    Daily,

    /// Run the daily ingestion on its cron schedule until interrupted.
    Schedule,

    /// Query stored decisions.
    Events {
        #[command(subcommand)]
        action: EventsAction,
    },

    /// Withdrawals and suspensions from the last 10 days.
    RecentWithdrawals,

    /// Show recent ingestion runs.
    Runs {
        /// Maximum number of runs to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Event query subcommands.
#[derive(Subcommand)]
pub(crate) enum EventsAction {
    /// List decisions, newest first.
    List {
        /// Only this event type: WITHDRAWAL, SUSPENSION or REGISTRATION.
        #[arg(long)]
        event_type: Option<String>,

        /// Only this source: GIF or URPL.
        #[arg(long)]
        source: Option<String>,

        /// Only decisions from the last 10 days.
        #[arg(long)]
        recent_only: bool,
    },
    /// Show one decision by id.
    Show {
        /// Event id.
        id: i64,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "drugwatch=info",
        1 => "drugwatch=debug",
        _ => "drugwatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so command output on stdout stays valid JSON.
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
    let env = Env {
        config_path: cli.config,
        database: cli.database,
    };

    match cli.command {
        Command::Scrape { source } => cmd_scrape(&env, source).await,
        Command::Daily => cmd_daily(&env).await,
        Command::Schedule => cmd_schedule(&env).await,
        Command::Events { action } => match action {
            EventsAction::List {
                event_type,
                source,
                recent_only,
            } => {
                let query = ListQuery {
                    event_type,
                    source,
                    recent_only,
                };
                cmd_events_list(&env, &query).await
            }
            EventsAction::Show { id } => cmd_events_show(&env, id).await,
        },
        Command::RecentWithdrawals => cmd_recent_withdrawals(&env).await,
        Command::Runs { limit } => cmd_runs(&env, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&env).await,
            ConfigAction::Show => cmd_config_show(&env).await,
        },
    }
}

/// Global flag values shared by every command.
struct Env {
    config_path: Option<PathBuf>,
    database: Option<PathBuf>,
}

impl Env {
    fn load_config(&self) -> Result<AppConfig> {
        let config = match &self.config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        Ok(config)
    }

    fn database_path(&self, config: &AppConfig) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(config.storage.resolved_path()?),
        }
    }

    /// Read-write storage, created and migrated on first use.
    async fn open_storage(&self, config: &AppConfig) -> Result<Storage> {
        let path = self.database_path(config)?;
        info!(path = %path.display(), "opening database");
        Ok(Storage::open(&path).await?)
    }

    /// Read-only storage for query commands.
    async fn open_readonly(&self, config: &AppConfig) -> Result<Storage> {
        let path = self.database_path(config)?;
        ensure_database_exists(&path)?;
        Ok(Storage::open_readonly(&path).await?)
    }
}

fn ensure_database_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(eyre!(
            "no database at {}: run `drugwatch scrape` or `drugwatch daily` first",
            path.display()
        ))
    }
}

/// Print a handler response body; non-2xx statuses become an error exit.
fn print_response(response: &ApiResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if response.is_success() {
        Ok(())
    } else {
        Err(eyre!("request failed with status {}", response.status))
    }
}

// ---------------------------------------------------------------------------
// Ingestion commands
// ---------------------------------------------------------------------------

async fn cmd_scrape(env: &Env, source: DataSource) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_storage(&config).await?;
    let scrape = ScrapeConfig::from(&config);
    let fetcher = HttpFetcher::new(&scrape)?;
    let clock = SystemClock;

    let adapter = adapter_for(source, config.sources.get(source).url.clone());
    let ctx = IngestContext {
        fetcher: &fetcher,
        storage: &storage,
        clock: &clock,
        lookback_days: scrape.lookback_days,
    };

    let reporter = CliProgress::new();
    let response = trigger_scrape(&ctx, adapter.as_ref(), &reporter).await;
    reporter.finish();

    print_response(&response)
}

async fn cmd_daily(env: &Env) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_storage(&config).await?;
    let scrape = ScrapeConfig::from(&config);
    let fetcher = HttpFetcher::new(&scrape)?;
    let registry = SourceRegistry::from_config(&config);
    let clock = SystemClock;

    let ctx = IngestContext {
        fetcher: &fetcher,
        storage: &storage,
        clock: &clock,
        lookback_days: scrape.lookback_days,
    };

    let reporter = CliProgress::new();
    let outcome = run_daily(&ctx, &registry, &reporter).await;
    reporter.finish();

    println!("{}", serde_json::to_string_pretty(&outcome?)?);
    Ok(())
}

async fn cmd_schedule(env: &Env) -> Result<()> {
    let config = env.load_config()?;
    let scrape = ScrapeConfig::from(&config);
    let schedule = ScheduleConfig::from(&config);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let job = Arc::new(DailyJob {
        registry: SourceRegistry::from_config(&config),
        fetcher: HttpFetcher::new(&scrape)?,
        storage: env.open_storage(&config).await?,
        clock,
        lookback_days: scrape.lookback_days,
    });

    info!(cron = %schedule.cron, sources = job.registry.len(), "starting daily scheduler");
    run_scheduler(job, &schedule).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Query commands
// ---------------------------------------------------------------------------

async fn cmd_events_list(env: &Env, query: &ListQuery) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_readonly(&config).await?;
    print_response(&list_events(&storage, &SystemClock, query).await)
}

async fn cmd_events_show(env: &Env, id: i64) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_readonly(&config).await?;
    print_response(&event_detail(&storage, id).await)
}

async fn cmd_recent_withdrawals(env: &Env) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_readonly(&config).await?;
    print_response(&recent_withdrawals(&storage, &SystemClock).await)
}

async fn cmd_runs(env: &Env, limit: u32) -> Result<()> {
    let config = env.load_config()?;
    let storage = env.open_readonly(&config).await?;
    let runs = storage.list_scrape_runs(limit).await?;
    println!("{}", serde_json::to_string_pretty(&runs)?);
    Ok(())
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_done(&self, source: DataSource, result: &ScrapeResult) {
        self.spinner.println(format!(
            "✓ {source}: {} new, {} duplicates, {} errors",
            result.new_records,
            result.duplicates_skipped,
            result.errors.len()
        ));
    }

    fn source_failed(&self, source: DataSource, error: &DrugwatchError) {
        self.spinner.println(format!("✗ {source}: {error}"));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init(env: &Env) -> Result<()> {
    let path = match &env.config_path {
        Some(path) => {
            init_config_at(path)?;
            path.clone()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(env: &Env) -> Result<()> {
    let config = env.load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

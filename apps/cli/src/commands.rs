//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use grantlens_assessment::prompt::truncate_chars;
use grantlens_assessment::{
    AssessOptions, AssessmentConfig, Assessor, ContextProvider, FileContext, OpenRouterBackend,
    render_report,
};
use grantlens_catalog::{CatalogClient, CatalogOptions, PageView, search};
use grantlens_shared::{AppConfig, Grant, format_usd, init_config, load_config, normalize};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// GrantLens: browse government grants and assess cancellation impact.
#[derive(Parser)]
#[command(
    name = "grantlens",
    version,
    about = "Browse government grants and generate cancellation-impact assessments.",
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
    /// List grants from the catalog.
    List {
        /// Grants endpoint (defaults to the configured base URI).
        #[arg(long)]
        base_uri: Option<String>,

        /// Fetch a single one-item page instead of the full catalog.
        #[arg(long)]
        probe: bool,

        /// Case-insensitive filter on recipient, agency, and description.
        #[arg(short, long)]
        search: Option<String>,

        /// Listing page to show (1-based).
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Print the matching grants as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Generate a cancellation-impact assessment for one grant.
    Assess {
        /// Grants endpoint (defaults to the configured base URI).
        #[arg(long)]
        base_uri: Option<String>,

        /// 1-based position of the grant in the (filtered) listing.
        #[arg(short, long, required_unless_present = "grant_file")]
        index: Option<usize>,

        /// Filter applied before `--index` is resolved.
        #[arg(short, long)]
        search: Option<String>,

        /// Read the grant from a JSON file instead of the catalog.
        #[arg(long, conflicts_with_all = ["index", "search", "base_uri"])]
        grant_file: Option<PathBuf>,

        /// File with extra context to include in the prompt.
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Sampling temperature (defaults to the configured value).
        #[arg(long)]
        temperature: Option<f32>,

        /// Top-k sampling (defaults to the configured value).
        #[arg(long)]
        top_k: Option<u32>,

        /// Write a Markdown report to this path.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
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
        0 => "grantlens=info",
        1 => "grantlens=debug",
        _ => "grantlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `list --json` output stays machine-readable.
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
        Command::List {
            base_uri,
            probe,
            search,
            page,
            json,
        } => cmd_list(base_uri.as_deref(), probe, search.as_deref(), page, json).await,
        Command::Assess {
            base_uri,
            index,
            search,
            grant_file,
            context_file,
            temperature,
            top_k,
            out,
        } => {
            let source = match grant_file {
                Some(path) => GrantSource::File(path),
                None => GrantSource::Catalog {
                    base_uri,
                    search,
                    index: index.ok_or_else(|| eyre!("--index is required"))?,
                },
            };
            cmd_assess(source, context_file, temperature, top_k, out.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

async fn cmd_list(
    base_uri: Option<&str>,
    probe: bool,
    query: Option<&str>,
    page: usize,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let grants = load_catalog(&config, base_uri, !probe).await?;
    let matches: Vec<&Grant> = search(&grants, query.unwrap_or_default());

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    let view = PageView::of(&matches, page, config.display.items_per_page);
    if view.items.is_empty() {
        println!("No grants found.");
        return Ok(());
    }

    println!();
    for (i, grant) in view.items.iter().enumerate() {
        println!(
            "  {:>5}  {:<10}  {:<32}  {:>14}  {}",
            view.offset + i + 1,
            truncate_chars(&grant.date, 10),
            truncate_chars(&grant.agency, 32),
            format_usd(grant.value),
            truncate_chars(&grant.recipient, 48),
        );
    }
    println!();
    println!(
        "  Page {}/{}, {} of {} grants match",
        view.page,
        view.total_pages,
        matches.len(),
        grants.len()
    );
    if view.has_next() {
        println!("  Next: --page {}", view.page + 1);
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// assess
// ---------------------------------------------------------------------------

/// Where the grant to assess comes from.
enum GrantSource {
    /// A JSON record on disk, normalized like catalog entries.
    File(PathBuf),
    /// The `index`-th grant of the (optionally filtered) catalog.
    Catalog {
        base_uri: Option<String>,
        search: Option<String>,
        index: usize,
    },
}

async fn cmd_assess(
    source: GrantSource,
    context_file: Option<PathBuf>,
    temperature: Option<f32>,
    top_k: Option<u32>,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;

    let grant = match source {
        GrantSource::File(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
            let raw: serde_json::Value = serde_json::from_str(&content)
                .map_err(|e| eyre!("'{}' is not valid JSON: {e}", path.display()))?;
            normalize(&raw)
        }
        GrantSource::Catalog {
            base_uri,
            search,
            index,
        } => {
            let grants = load_catalog(&config, base_uri.as_deref(), true).await?;
            select_grant(&grants, search.as_deref().unwrap_or_default(), index)?
        }
    };

    info!(recipient = %grant.recipient, agency = %grant.agency, "assessing grant");

    let backend = Arc::new(OpenRouterBackend::new(config.model.clone()));
    let assessor = Assessor::new(backend, AssessmentConfig::from(&config.model));

    let context = context_file.map(FileContext::new);
    let options = AssessOptions {
        context_provider: context.as_ref().map(|c| c as &dyn ContextProvider),
        temperature,
        top_k,
    };

    let spinner = spinner("Analyzing grant impact…")?;
    let result = assessor.assess(&grant, &options).await;
    spinner.finish_and_clear();
    let assessment = result?;

    println!("{assessment}");

    if let Some(path) = out {
        let report = render_report(&grant, &assessment, chrono::Utc::now());
        std::fs::write(path, report).map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
        println!();
        println!("  Report saved to {}", path.display());
    }

    Ok(())
}

/// Pick the 1-based `index`-th grant among those matching `query`.
fn select_grant(grants: &[Grant], query: &str, index: usize) -> Result<Grant> {
    let matches = search(grants, query);
    if index == 0 || index > matches.len() {
        return Err(eyre!(
            "grant index {index} out of range: {} grants match",
            matches.len()
        ));
    }
    Ok(matches[index - 1].clone())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_catalog(config: &AppConfig, base_uri: Option<&str>, paginate: bool) -> Result<Vec<Grant>> {
    let base_uri = base_uri.unwrap_or(&config.catalog.base_uri);
    let url = Url::parse(base_uri).map_err(|e| eyre!("invalid base URI '{base_uri}': {e}"))?;
    let client = CatalogClient::new(CatalogOptions::from(&config.catalog))?;

    let spinner = spinner("Loading grants…")?;
    let result = client.fetch_report(&url, paginate).await;
    spinner.finish_and_clear();
    let report = result?;

    for failure in &report.failures {
        warn!(page = failure.page, error = %failure.error, "page skipped");
    }
    info!(
        grants = report.grants.len(),
        pages = report.pages_requested,
        "grants loaded"
    );

    Ok(report.grants)
}

/// Steady-ticking spinner on stderr.
fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

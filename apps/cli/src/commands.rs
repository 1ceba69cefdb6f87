//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use poshdocset_core::{BuildResult, ProgressReporter, build_docset};
use poshdocset_shared::{
    AppConfig, RunConfig, RunOverrides, SUPPORTED_VERSIONS, init_config, load_config,
};
use poshdocset_storage::SearchIndex;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// poshdocset: the PowerShell module reference as an offline docset.
#[derive(Parser)]
#[command(
    name = "poshdocset",
    version,
    about = "Build a searchable offline docset of the PowerShell module reference.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Crawl the module reference and write the docset archive.
    Build {
        /// Content version to download.
        #[arg(long = "version", value_name = "VERSION", value_parser = clap::builder::PossibleValuesParser::new(SUPPORTED_VERSIONS.iter().copied()))]
        doc_version: Option<String>,

        /// Directory receiving the build folder and `versions/<v>/` archive.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build in a throwaway temporary folder.
        #[arg(short, long, conflicts_with = "local")]
        temporary: bool,

        /// Reuse the pages downloaded by a previous run.
        #[arg(short, long)]
        local: bool,

        /// Chrome or Chromium executable used to render the start page.
        #[arg(long, env = "POSHDOCSET_BROWSER")]
        browser: Option<PathBuf>,

        /// Directory holding Info.plist, DASH_LICENSE, and the icons.
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Look a name up in a built search index.
    Lookup {
        /// Module or command name (exact match).
        name: String,

        /// Path to `docSet.dsidx`.
        #[arg(long)]
        index: PathBuf,
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

/// HTTP and browser internals stay at warn whatever the verbosity.
const QUIET_DEPENDENCIES: &str = "reqwest=warn,hyper=warn,hyper_util=warn,chromiumoxide=warn,tungstenite=warn";

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},{QUIET_DEPENDENCIES}")));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Build {
            doc_version,
            output,
            temporary,
            local,
            browser,
            static_dir,
        } => {
            let overrides = RunOverrides {
                version: doc_version,
                output_dir: output,
                static_dir,
                browser,
                temporary,
                local,
            };
            cmd_build(overrides).await
        }
        Command::Lookup { name, index } => cmd_lookup(&name, &index).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(overrides: RunOverrides) -> Result<()> {
    let app = load_config()?;
    let config = RunConfig::resolve(&app, overrides)?;

    info!(
        version = %config.version,
        output = %config.output_dir.display(),
        build_dir = %config.build_dir.display(),
        "building docset"
    );

    let reporter = CliProgress::new();
    let result = build_docset(&config, &reporter).await;
    if result.is_err() {
        reporter.spinner.abandon();
    }
    let result = result?;

    println!();
    println!("  Docset built successfully!");
    println!("  Archive:  {}", result.archive_path.display());
    println!("  Size:     {} bytes", result.archive_bytes);
    println!("  SHA-256:  {}", result.archive_sha256);
    println!("  Modules:  {}", result.modules);
    println!("  Commands: {}", result.commands);
    println!(
        "  Styles:   {} referenced, {} downloaded",
        result.resources, result.enrichment.stylesheets
    );
    println!("  Render:   {} attempt(s)", result.enrichment.render_attempts);
    println!(
        "  Index:    {} inserted, {} skipped, {} failed",
        result.index.inserted,
        result.index.skipped,
        result.index.failed.len()
    );
    println!("  Started:  {}", result.started_at.to_rfc3339());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_lookup(name: &str, index: &Path) -> Result<()> {
    let search = SearchIndex::open_readonly(index).await?;
    let entries = search.lookup(name).await?;

    if entries.is_empty() {
        return Err(eyre!("no entry named '{name}' in {}", index.display()));
    }
    for entry in entries {
        println!("{:<8} {:<40} {}", entry.entry_type.as_str(), entry.name, entry.path);
    }
    Ok(())
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

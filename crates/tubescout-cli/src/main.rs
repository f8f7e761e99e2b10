//! Tubescout CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use tubescout::{
    read_terms, ChromiumProvider, ConfigLoader, ExtractorRegistry, HarvestError, Harvester,
    KeyStore, OutputFormat, OutputWriter, Scraper, TargetConfig,
};

/// Records shown by `scrape` before saving.
const PREVIEW_LEN: usize = 5;

#[derive(Parser)]
#[command(
    name = "tubescout",
    about = "Harvest YouTube channel listings from search results",
    version
)]
struct Cli {
    /// Directory holding `<name>.toml` target configs.
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Directory for the key file and structured output.
    #[arg(long, global = true, default_value = "output")]
    output_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest channel URLs for every term in a keyword file.
    Batch {
        /// Keyword file, one term per line.
        #[arg(short, long, default_value = "keywords.txt")]
        keywords: PathBuf,

        /// Stop starting new terms once this many URLs are stored (0 = no limit).
        #[arg(short, long, default_value_t = 1000)]
        target: usize,

        /// Concurrent browser sessions.
        #[arg(short, long, default_value_t = 3)]
        workers: usize,

        /// Target config name.
        #[arg(short, long, default_value = "channels")]
        config: String,
    },

    /// Scrape a single query and save the records.
    Scrape {
        /// Search query.
        query: String,

        /// Target config name.
        #[arg(short, long, default_value = "channels")]
        config: String,

        /// Print the preview only.
        #[arg(long)]
        no_save: bool,

        /// Output format (csv, json). Defaults to the config's setting.
        #[arg(long)]
        format: Option<String>,
    },

    /// List available target configs.
    Configs,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   tubescout completions bash > ~/.local/share/bash-completion/completions/tubescout
    ///   tubescout completions zsh > ~/.zfunc/_tubescout
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(&cli.config_dir);

    match cli.command {
        Commands::Batch {
            keywords,
            target,
            workers,
            config,
        } => {
            let terms = match read_terms(&keywords) {
                Ok(terms) => terms,
                Err(HarvestError::TermsNotFound(path)) => {
                    tracing::error!("{path} not found");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let config = loader.load(&config)?;
            let scraper = build_scraper(config)?;
            let store = Arc::new(KeyStore::open(&cli.output_dir)?);
            let summary = Harvester::new(scraper, store)
                .run(terms, target, workers)
                .await?;

            println!("Terms processed: {}/{}", summary.terms_processed, summary.terms_total);
            if summary.terms_failed > 0 {
                println!("Terms failed:    {}", summary.terms_failed);
            }
            if summary.terms_cancelled > 0 {
                println!("Terms skipped:   {}", summary.terms_cancelled);
            }
            println!(
                "Total URLs:      {} ({} new)",
                summary.total_keys, summary.new_keys
            );
            println!("Saved to:        {}", summary.key_file.display());
        }

        Commands::Scrape {
            query,
            config,
            no_save,
            format,
        } => {
            let format = format
                .as_deref()
                .map(str::parse::<OutputFormat>)
                .transpose()?;
            let config = loader.load(&config)?;
            let scraper = build_scraper(config)?;

            let records = scraper.scrape(&query).await?;
            println!("Scraped {} channels for {query:?}", records.len());
            for record in records.iter().take(PREVIEW_LEN) {
                println!("{}", serde_json::to_string_pretty(record)?);
            }

            if !no_save {
                let writer = OutputWriter::new(&cli.output_dir)?;
                if let Some(path) = scraper.save(&writer, &records, &query, format)? {
                    println!("Saved to: {}", path.display());
                }
            }
        }

        Commands::Configs => {
            let names = loader.list_configs()?;
            if names.is_empty() {
                println!("No configs in {}", loader.config_dir().display());
            }
            for name in names {
                println!("{name}");
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tubescout", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn build_scraper(config: TargetConfig) -> anyhow::Result<Scraper> {
    let provider = Arc::new(ChromiumProvider::new(config.options.clone()));
    Ok(Scraper::new(
        config,
        provider,
        &ExtractorRegistry::with_defaults(),
    )?)
}

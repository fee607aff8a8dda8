use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gallery_acquire::output::{write_report, BatchReport};
use gallery_acquire::{
    BatchController, Browser, ChromiumBrowser, Dispatcher, HttpImageFetcher, StaticBrowser,
};
use gallery_model::{load_paintings, ScrapeConfig, Terminal};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Artwork image acquisition and validation tool for plaque galleries")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// Find and download the artwork image for every painting in a list
    Scrape {
        /// Painting list JSON (name, plaque_text, urls)
        #[arg(short, long)]
        input: String,

        /// Scrape configuration JSON; missing keys use the defaults
        #[arg(short, long)]
        config: Option<String>,

        /// Directory for downloaded images (overrides the config)
        #[arg(short = 'O', long)]
        output_dir: Option<String>,

        /// Directory for results.json and summary.md (default: the image directory)
        #[arg(short, long)]
        results_dir: Option<String>,

        /// Paintings processed concurrently per group (overrides the config)
        #[arg(short, long)]
        group_size: Option<usize>,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Page engine
        #[arg(short, long, value_enum, default_value = "chromium")]
        engine: Engine,
    },

    /// Validate a painting list and configuration without scraping
    Validate {
        /// Path to the painting list JSON
        file: String,

        /// Scrape configuration JSON to check alongside it
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the default scrape configuration as JSON
    Config,
}

#[derive(Clone, clap::ValueEnum)]
enum Engine {
    /// Headless Chrome over CDP (renders JavaScript, real layout)
    Chromium,
    /// Plain HTTP fetch and HTML parse (no JavaScript, sizes from attributes)
    Static,
}

fn load_config(path: Option<&str>) -> Result<ScrapeConfig> {
    match path {
        Some(path) => ScrapeConfig::load(path),
        None => Ok(ScrapeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Map log level, keeping HTML-parsing and CDP transport crates quiet below info
    let quiet = "selectors=warn,html5ever=warn,chromiumoxide=warn,hyper=warn,tungstenite=warn";
    let level = match cli.log_level {
        LogLevel::Error => "error".to_string(),
        LogLevel::Warn => "warn".to_string(),
        LogLevel::Info => format!("info,{quiet}"),
        LogLevel::Debug => format!("debug,{quiet}"),
        LogLevel::Trace => format!("trace,{quiet}"),
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    match cli.command {
        Commands::Scrape {
            input,
            config,
            output_dir,
            results_dir,
            group_size,
            headful,
            engine,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(size) = group_size {
                config.group_size = size;
            }
            if headful {
                config.headless = false;
            }
            let results_dir = results_dir.unwrap_or_else(|| config.output_dir.clone());

            let paintings = load_paintings(&input)?;
            let mut findings = gallery_validate::validate_paintings(&paintings);
            findings.extend(gallery_validate::validate_config(&config));
            gallery_validate::report(&findings).context("Refusing to scrape invalid input")?;

            tracing::info!(
                input = %input,
                paintings = paintings.len(),
                output_dir = %config.output_dir,
                group_size = config.group_size,
                "Scraping artwork images"
            );

            let browser: Arc<dyn Browser> = match engine {
                Engine::Chromium => {
                    Arc::new(ChromiumBrowser::launch(config.headless, &config.user_agent).await?)
                }
                Engine::Static => Arc::new(StaticBrowser::new(
                    &config.user_agent,
                    config.timeouts.page_load(),
                )?),
            };
            let fetcher = Arc::new(HttpImageFetcher::new(
                &config.user_agent,
                config.timeouts.download(),
            )?);

            let config = Arc::new(config);
            let dispatcher = Dispatcher::new(Arc::clone(&browser), fetcher, Arc::clone(&config))
                .context("Invalid consent keywords")?;
            let controller = BatchController::new(Arc::new(dispatcher), config.group_size);
            let table = controller.run(&paintings).await;

            if let Err(e) = browser.shutdown().await {
                tracing::warn!(error = %e, "Browser did not shut down cleanly");
            }

            let report = BatchReport::from_table(&table);
            write_report(&report, &results_dir)?;
            tracing::info!(
                saved = report.count(Terminal::Success),
                exhausted = report.count(Terminal::Exhausted),
                no_candidates = report.count(Terminal::NoCandidates),
                aborted = report.count(Terminal::Aborted),
                "Scrape finished"
            );
        }
        Commands::Validate { file, config } => {
            tracing::info!(file = %file, "Validating");
            let config = load_config(config.as_deref())?;
            gallery_validate::validate(&file, &config)?;
        }
        Commands::Config => {
            let json = serde_json::to_string_pretty(&ScrapeConfig::default())?;
            println!("{json}");
        }
    }

    Ok(())
}

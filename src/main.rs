//! Snapcrawl main entry point
//!
//! Command-line front end for crawl-and-capture runs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use snapcrawl::config::{load_config_with_hash, Config};
use snapcrawl::crawler::{build_lookup, build_service, serve, CrawlRequest};
use snapcrawl::output::RunResponse;
use snapcrawl::RunId;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Snapcrawl: capture a page and the pages it links to
///
/// Every crawl produces a run id; the screenshots of a run can be looked up
/// again later by that id.
#[derive(Parser, Debug)]
#[command(name = "snapcrawl")]
#[command(version)]
#[command(about = "Crawl a page and capture screenshots of it and its links", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a start page and capture it plus up to N of its links
    Crawl {
        /// Absolute http(s) URL of the start page
        #[arg(value_name = "START_URL")]
        start_url: String,

        /// Number of links to follow from the start page
        #[arg(short = 'n', long = "links", default_value_t = 0, allow_negative_numbers = true)]
        links: i64,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up the screenshots of a previous run
    Lookup {
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer newline-delimited JSON requests from stdin until EOF
    ///
    /// One process keeps the cache warm across requests:
    /// `{"op":"crawl","start_url":"...","number_of_links_to_follow":N}` or
    /// `{"op":"lookup","run_id":"..."}`, one JSON reply per line on stdout.
    Serve,

    /// Validate the configuration and show the effective settings
    Check,
}

/// Exit status when a looked-up run does not exist
const EXIT_NOT_FOUND: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Check => {
            handle_check(&config, &config_hash);
            Ok(())
        }
        Command::Crawl {
            start_url,
            links,
            json,
        } => {
            let (orchestrator, _) = build_service(&config)?;
            let outcome = orchestrator
                .crawl(&CrawlRequest::new(start_url, links))
                .await?;
            print_response(&RunResponse::from(&outcome), json)
        }
        Command::Serve => {
            let (orchestrator, lookup) = build_service(&config)?;
            let handled = serve(
                &orchestrator,
                &lookup,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
            tracing::info!("Served {} requests", handled);
            Ok(())
        }
        Command::Lookup { run_id, json } => {
            let lookup = build_lookup(&config)?;
            match lookup.lookup(&RunId::from(run_id.as_str())).await? {
                Some(view) => print_response(&RunResponse::from(&view), json),
                None => {
                    eprintln!("Run {} not found", run_id);
                    std::process::exit(EXIT_NOT_FOUND);
                }
            }
        }
    }
}

/// Sets up logging based on verbosity flags
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("snapcrawl=info,warn"),
            1 => EnvFilter::new("snapcrawl=debug,info"),
            2 => EnvFilter::new("snapcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_response(response: &RunResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", response.to_json()?);
    } else {
        print!("{}", response.to_text());
    }
    Ok(())
}

/// Handles the `check` command: prints the effective settings
fn handle_check(config: &Config, config_hash: &str) {
    println!("=== Snapcrawl Configuration ===\n");
    println!("Config hash: {}\n", config_hash);

    println!("Renderer:");
    println!("  Backend: {:?}", config.renderer.backend);
    println!("  User agent: {}", config.renderer.user_agent);
    println!("  Page timeout: {} ms", config.renderer.page_timeout_ms);
    println!(
        "  Max concurrent captures: {}",
        config.renderer.max_concurrent_captures
    );
    println!("  Headless: {}", config.renderer.headless);
    println!();

    println!("Output:");
    println!("  Database: {}", config.output.database_path);
    println!("  Artifact directory: {}", config.output.artifact_dir);
    println!();

    println!("Cache:");
    println!("  TTL: {} s", config.cache.ttl_secs);
    println!("  Capacity: {} runs", config.cache.capacity);
    println!("  Re-prime on miss: {}", config.cache.reprime_on_miss);

    println!("\n=== Configuration valid ===");
}

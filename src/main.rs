//! CLI entry point for semantic news ranking.
//!
//! Ranks a JSON file of aggregated articles against a query and manages the
//! persistent vector cache.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use newsrank::display::{create_cache_stats_table, create_nearest_table, create_results_table};
use newsrank::io::{ErrorResponse, ExitCode, OutputFormat};
use newsrank::{Article, SearchError, SearchRequest, SemanticSearch, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic news ranking
#[derive(Parser)]
#[command(
    name = "newsrank",
    version = env!("CARGO_PKG_VERSION"),
    about = "Rank news articles by semantic relevance to a query",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize workspace
    #[command(about = "Set up .newsrank directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .newsrank/settings.toml")]
    Config,

    /// Rank articles against a query
    #[command(
        about = "Rank articles by similarity to a query",
        after_help = "Examples:\n  newsrank search \"semiconductor exports\" --articles feed.json\n  cat feed.json | newsrank search \"election\" --articles - --num 5 --json\n  newsrank search \"AI\" --articles feed.json --min-similarity 0.3"
    )]
    Search {
        /// Query text (1 to 200 characters)
        query: String,

        /// JSON array of articles, or `-` for stdin
        #[arg(short, long)]
        articles: PathBuf,

        /// Maximum number of results
        #[arg(short, long)]
        num: Option<usize>,

        /// Drop results scoring below this value (0.0 to 1.0)
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Articles encoded per batch (10 to 500)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Stop scanning once this many articles pass the floor
        #[arg(long)]
        early_stop: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect or reset the vector cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show vector cache and response cache statistics
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete every cached vector and response
    Clear,

    /// List the cached articles closest to a query
    Nearest {
        /// Query text
        query: String,

        /// Number of neighbours
        #[arg(short, default_value = "10")]
        k: usize,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => match Settings::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Configuration error loading from {}: {e}", path.display());
                return ExitCode::GeneralError.into();
            }
        },
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    newsrank::logging::init_logging(&settings.logging, cli.verbose || settings.debug);

    let code = match cli.command {
        Commands::Init { force } => run_init(force),
        Commands::Config => run_config(&settings),
        Commands::Search {
            query,
            articles,
            num,
            min_similarity,
            chunk_size,
            early_stop,
            json,
        } => {
            let request = SearchRequest {
                q: query,
                num: num.unwrap_or(settings.search.default_num),
                min_similarity: min_similarity.unwrap_or(settings.search.default_min_similarity),
                chunk_size: chunk_size.unwrap_or(settings.search.default_chunk_size),
                early_stop_threshold: early_stop,
            };
            run_search(
                &settings,
                &request,
                &articles,
                OutputFormat::from_json_flag(json),
            )
        }
        Commands::Cache { action } => run_cache(&settings, action),
    };

    code.into()
}

fn run_init(force: bool) -> ExitCode {
    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::GeneralError
        }
    }
}

fn run_config(settings: &Settings) -> ExitCode {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(settings) {
        Ok(toml_str) => {
            println!("{toml_str}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error displaying config: {e}");
            ExitCode::GeneralError
        }
    }
}

fn run_search(
    settings: &Settings,
    request: &SearchRequest,
    articles_path: &Path,
    format: OutputFormat,
) -> ExitCode {
    // Reject bad parameters before paying for model load
    if let Err(e) = request.validated() {
        return report_error(&e, format);
    }

    let articles = match read_articles(articles_path) {
        Ok(articles) => articles,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::GeneralError;
        }
    };

    let search = SemanticSearch::from_settings(settings);
    match search.search(request, articles) {
        Ok(response) => {
            if format.is_json() {
                match serde_json::to_string_pretty(&response) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing response: {e}");
                        return ExitCode::GeneralError;
                    }
                }
            } else if response.is_empty() {
                println!("No articles matched \"{}\"", response.query);
            } else {
                println!("{}", create_results_table(&response));
                println!("{} result(s) for \"{}\"", response.total, response.query);
            }
            ExitCode::Success
        }
        Err(e) => report_error(&e, format),
    }
}

fn run_cache(settings: &Settings, action: CacheAction) -> ExitCode {
    let search = SemanticSearch::from_settings(settings);

    match action {
        CacheAction::Stats { json } => {
            let store_stats = search.store().map(|store| store.read().stats());
            let response_stats = search.result_cache().map(|cache| cache.stats());
            if json {
                let value = serde_json::json!({
                    "available": search.is_available(),
                    "vector_cache": store_stats.as_ref().map(|s| serde_json::json!({
                        "dir": s.dir,
                        "model": s.model_name,
                        "dimension": s.dimension,
                        "entries": s.entries,
                        "generation": s.generation,
                        "updated_at": s.updated_at,
                    })),
                    "result_cache": response_stats.as_ref().map(|s| serde_json::json!({
                        "total": s.total,
                        "valid": s.valid,
                        "expired": s.expired,
                        "ttl_secs": s.ttl.as_secs(),
                    })),
                });
                println!("{value:#}");
            } else {
                if !search.is_available() {
                    eprintln!("Warning: embedding model unavailable, showing cache on disk only");
                }
                println!(
                    "{}",
                    create_cache_stats_table(store_stats.as_ref(), response_stats.as_ref())
                );
            }
            ExitCode::Success
        }
        CacheAction::Clear if search.store().is_none() => {
            eprintln!("Vector cache is not open (caching disabled or model unavailable)");
            ExitCode::GeneralError
        }
        CacheAction::Clear => match search.clear_caches() {
            Ok(()) => {
                println!("Cleared vector cache at {}", settings.cache_dir().display());
                ExitCode::Success
            }
            Err(e) => report_error(&e, OutputFormat::Text),
        },
        CacheAction::Nearest { query, k } => match search.nearest(&query, k) {
            Ok(neighbours) if neighbours.is_empty() => {
                println!("Vector cache is empty");
                ExitCode::Success
            }
            Ok(neighbours) => {
                println!("{}", create_nearest_table(&neighbours));
                ExitCode::Success
            }
            Err(e) => report_error(&e, OutputFormat::Text),
        },
    }
}

fn read_articles(path: &Path) -> anyhow::Result<Vec<Article>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read articles from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read articles from {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Articles must be a JSON array of article objects")
}

fn report_error(error: &SearchError, format: OutputFormat) -> ExitCode {
    let code = ExitCode::from_error(error);
    if format.is_json() {
        match serde_json::to_string_pretty(&ErrorResponse::from_error(error)) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    } else {
        eprintln!("Error: {error}");
        for suggestion in error.recovery_suggestions() {
            eprintln!("  - {suggestion}");
        }
    }
    code
}

//! Command-line interface for treescope.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::Config;
use crate::elements::ElementCategory;
use crate::engine::{AnalysisEngine, AnalyzeRequest, AnalyzeResult, FormatOptions};
use crate::plugin::PluginRegistry;
use crate::query::{QueryOptions, QueryRef};
use crate::report::{self, JsonFailure, JsonReport};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "target", "__pycache__", "dist", "build"];

/// Multi-language structural code analyzer.
///
/// Parses source files with tree-sitter and lists their functions, classes,
/// fields, variables and imports, or runs structural queries over them.
#[derive(Parser)]
#[command(name = "treescope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config YAML file (default: auto-discover)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract elements or run a query over files
    Analyze(AnalyzeArgs),
    /// List supported languages
    Languages,
    /// List the named queries of a language
    Queries(QueriesArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Language name or alias (default: detect per file)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Element categories to extract (function, class, field, variable, import)
    #[arg(short, long = "category", value_parser = parse_category)]
    pub categories: Vec<ElementCategory>,

    /// Named query to run
    #[arg(short, long, conflicts_with = "raw_query")]
    pub query: Option<String>,

    /// Raw tree-sitter query to run
    #[arg(long)]
    pub raw_query: Option<String>,

    /// Only report this capture of the query
    #[arg(long)]
    pub capture: Option<String>,

    /// Report every capture of each match
    #[arg(long)]
    pub all_captures: bool,

    /// Maximum query results per file
    #[arg(long)]
    pub limit: Option<usize>,

    /// Filter, e.g. "name=~get*,static=false,params>=1"
    #[arg(short = 'F', long)]
    pub filter: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Omit element source text
    #[arg(long)]
    pub no_raw_text: bool,

    /// Omit doc comments
    #[arg(long)]
    pub no_doc: bool,
}

/// Arguments for the queries command.
#[derive(Parser)]
pub struct QueriesArgs {
    /// Language name or alias
    pub language: String,
}

fn parse_category(s: &str) -> Result<ElementCategory, String> {
    ElementCategory::parse(s).ok_or_else(|| {
        format!(
            "unknown category {:?}, expected one of function, class, field, variable, import",
            s
        )
    })
}

fn print_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Run a parsed command line and return the process exit code.
pub fn run(cli: Cli) -> i32 {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = match Config::load(cli.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(e) => {
            crate::logging::init("warn", cli.verbose);
            print_error(format!("{:#}", e));
            return EXIT_ERROR;
        }
    };
    crate::logging::init(&config.logging.level, cli.verbose);

    let registry = Arc::new(PluginRegistry::builtin(config.sniff.clone()));
    let outcome = match &cli.command {
        Commands::Analyze(args) => run_analyze(args, &config, registry),
        Commands::Languages => run_languages(&registry),
        Commands::Queries(args) => run_queries(args, &registry),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            print_error(format!("{:#}", e));
            EXIT_ERROR
        }
    }
}

/// Collect files to analyze. Explicit files are always kept; files found by
/// walking a directory are kept when some language claims their name.
fn collect_files(
    paths: &[PathBuf],
    config: &Config,
    registry: &PluginRegistry,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for root in paths {
        let metadata = std::fs::metadata(root)
            .map_err(|e| anyhow::anyhow!("cannot access path {}: {}", root.display(), e))?;
        if !metadata.is_dir() {
            files.push(root.clone());
            continue;
        }

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                // Skip hidden and vendored directories
                !name.starts_with('.') && !SKIPPED_DIRS.contains(&&*name)
            })
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if config.is_path_excluded(path) {
                continue;
            }
            let name = path.to_string_lossy();
            if registry.resolve(&name, None).is_ok() {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

fn build_request(args: &AnalyzeArgs, path: &Path) -> anyhow::Result<AnalyzeRequest> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
    let query = match (&args.query, &args.raw_query) {
        (Some(key), _) => Some(QueryRef::Named(key.clone())),
        (None, Some(raw)) => Some(QueryRef::Raw(raw.clone())),
        (None, None) => None,
    };
    Ok(AnalyzeRequest {
        file_path: path.to_string_lossy().into_owned(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
        language_hint: args.language.clone(),
        categories: args.categories.clone(),
        query,
        query_options: QueryOptions {
            all_captures: args.all_captures,
            capture: args.capture.clone(),
            limit: args.limit,
        },
        filter: args.filter.clone(),
        format: FormatOptions {
            include_raw_text: !args.no_raw_text,
            include_doc: !args.no_doc,
        },
    })
}

fn progress_bar(total: usize) -> ProgressBar {
    if total < 2 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Run the analyze command.
pub fn run_analyze(
    args: &AnalyzeArgs,
    config: &Config,
    registry: Arc<PluginRegistry>,
) -> anyhow::Result<i32> {
    if let Some(filter) = &args.filter {
        if let Err(e) = crate::query::FilterChain::parse(filter) {
            print_error(format!("invalid filter: {}", e));
            return Ok(EXIT_ERROR);
        }
    }
    if let Some(language) = &args.language {
        if registry.normalize(language).is_none() {
            print_error(format!("unsupported language {:?}", language));
            return Ok(EXIT_ERROR);
        }
    }

    let files = collect_files(&args.paths, config, &registry)?;
    if files.is_empty() {
        eprintln!("{} no files to analyze", "Warning:".yellow().bold());
        return Ok(EXIT_SUCCESS);
    }

    let engine = AnalysisEngine::new(registry, config);
    let bar = progress_bar(files.len());

    let outcomes: Vec<Result<AnalyzeResult, JsonFailure>> = files
        .par_iter()
        .map(|path| {
            let label = path.to_string_lossy();
            let outcome = match build_request(args, path) {
                Ok(request) => engine
                    .analyze(&request)
                    .map_err(|e| JsonFailure::new(&label, &e)),
                Err(e) => Err(JsonFailure {
                    file: label.to_string(),
                    kind: crate::error::ErrorKind::InvalidRequest,
                    identifier: None,
                    message: format!("{:#}", e),
                }),
            };
            bar.inc(1);
            outcome
        })
        .collect();
    bar.finish_and_clear();

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(failure) => failures.push(failure),
        }
    }
    tracing::debug!(stats = ?engine.stats(), "analyze finished");

    let failed = !failures.is_empty();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Json => report::write_json(&mut out, &JsonReport::new(results, failures))?,
        OutputFormat::Text => report::write_text(&mut out, &results, &failures)?,
    }

    Ok(if failed { EXIT_FAILED } else { EXIT_SUCCESS })
}

/// Run the languages command.
pub fn run_languages(registry: &PluginRegistry) -> anyhow::Result<i32> {
    let stdout = io::stdout();
    report::write_languages(&mut stdout.lock(), &registry.languages())?;
    Ok(EXIT_SUCCESS)
}

/// Run the queries command.
pub fn run_queries(args: &QueriesArgs, registry: &PluginRegistry) -> anyhow::Result<i32> {
    let Some(id) = registry.normalize(&args.language) else {
        print_error(format!("unsupported language {:?}", args.language));
        return Ok(EXIT_ERROR);
    };
    let queries = registry.named_queries(id)?;
    let stdout = io::stdout();
    report::write_queries(&mut stdout.lock(), id, queries)?;
    Ok(EXIT_SUCCESS)
}

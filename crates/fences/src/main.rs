use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fences_core::catalog::{self, BatchPolicy, BatchReport};
use fences_core::config::{Config, CONFIG_FILE};
use fences_core::distribution::DistributionQuery;
use fences_core::document::load_model;
use fences_core::export::MemorySink;
use fences_core::predicate::Predicate;
use fences_core::store::ModelStore;
use fences_core::types::{Direction, EntityVariant};

use fences_report::{json, markdown, text, CsvSink, OutputFormat};

#[derive(Parser)]
#[command(name = "fences")]
#[command(about = "Compute quartile-based outlier thresholds for code metrics")]
#[command(version)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis catalog and write one stat file per analysis
    Run {
        /// Model document (JSON)
        model: PathBuf,
        /// Config file path (defaults to .fences.toml next to the model)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for stat files
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// File name prefix (defaults to the model file stem)
        #[arg(long)]
        prefix: Option<String>,
        /// Run only the named analyses
        #[arg(long)]
        only: Vec<String>,
        /// Skip the remaining analyses after the first failure
        #[arg(long)]
        fail_fast: bool,
        /// Compute thresholds without writing files
        #[arg(long)]
        dry_run: bool,
        /// Summary format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Compute thresholds for one property outside the catalog
    Quartile {
        /// Model document (JSON)
        model: PathBuf,
        /// Entity variant: application, class, function
        #[arg(long)]
        variant: String,
        /// Metric name
        #[arg(long)]
        property: String,
        /// Filter expression, e.g. "not has(is_interface) and number_of_methods > 0"
        #[arg(long)]
        filter: Option<String>,
        /// high-is-bad or low-is-bad
        #[arg(long, default_value = "high-is-bad")]
        direction: String,
        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print every metric of every entity
    Describe {
        /// Model document (JSON)
        model: PathBuf,
    },
    /// List the effective analysis catalog
    Catalog {
        /// Config file path (defaults to .fences.toml in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create a default .fences.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            model,
            config,
            out_dir,
            prefix,
            only,
            fail_fast,
            dry_run,
            format,
        } => cmd_run(RunArgs {
            model: &model,
            config: config.as_deref(),
            out_dir,
            prefix,
            only,
            fail_fast,
            dry_run,
            format: &format,
        }),
        Commands::Quartile {
            model,
            variant,
            property,
            filter,
            direction,
            format,
        } => cmd_quartile(
            &model,
            &variant,
            &property,
            filter.as_deref(),
            &direction,
            &format,
        ),
        Commands::Describe { model } => cmd_describe(&model),
        Commands::Catalog { config } => cmd_catalog(config.as_deref()),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

struct RunArgs<'a> {
    model: &'a Path,
    config: Option<&'a Path>,
    out_dir: Option<PathBuf>,
    prefix: Option<String>,
    only: Vec<String>,
    fail_fast: bool,
    dry_run: bool,
    format: &'a str,
}

/// Returns whether every analysis succeeded.
fn cmd_run(args: RunArgs<'_>) -> Result<bool> {
    let format: OutputFormat = args.format.parse()?;
    let config = load_config(model_dir(args.model), args.config)?;
    let model = load_model(args.model)?;

    let mut catalog = config.catalog().context("invalid analysis catalog")?;
    if !args.only.is_empty() {
        catalog = catalog.only(&args.only)?;
    }
    let policy = if args.fail_fast {
        BatchPolicy::Abort
    } else {
        config.batch.on_error
    };

    let store = ModelStore::new(&model);
    let report = if args.dry_run {
        let mut sink = MemorySink::new();
        catalog.run(&store, &mut sink, policy)
    } else {
        let directory = args.out_dir.unwrap_or(config.output.directory);
        let prefix = args
            .prefix
            .or(config.output.prefix)
            .unwrap_or_else(|| model_stem(args.model));
        let mut sink = CsvSink::new(directory, prefix);
        let report = catalog.run(&store, &mut sink, policy);
        info!(
            files = sink.written().len(),
            directory = %sink.directory().display(),
            "stat files written"
        );
        report
    };

    print!("{}", render_batch(&report, format)?);
    Ok(report.failed_count() == 0)
}

fn render_batch(report: &BatchReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => text::format_batch(report),
        OutputFormat::Json => {
            let mut out = json::format_batch(report, false)?;
            out.push('\n');
            out
        }
        OutputFormat::Markdown => markdown::format_batch(report),
    })
}

fn cmd_quartile(
    model_path: &Path,
    variant: &str,
    property: &str,
    filter: Option<&str>,
    direction: &str,
    format: &str,
) -> Result<bool> {
    let variant: EntityVariant = variant.parse()?;
    let direction: Direction = direction.parse()?;
    let format: OutputFormat = format.parse()?;
    let predicate = match filter {
        Some(expr) => Predicate::parse(expr)?,
        None => Predicate::Always,
    };

    let model = load_model(model_path)?;
    let store = ModelStore::new(&model);
    let query = DistributionQuery::new(variant, property, predicate);
    let outcome = catalog::evaluate(&store, &query, direction)?;

    match format {
        OutputFormat::Text => print!("{}", text::format_outcome(&query.analysis, &outcome)),
        OutputFormat::Json => println!("{}", json::format_outcome(&query.analysis, &outcome)?),
        OutputFormat::Markdown => {
            anyhow::bail!("markdown output is only available for `fences run`")
        }
    }
    Ok(true)
}

fn cmd_describe(model_path: &Path) -> Result<bool> {
    let model = load_model(model_path)?;
    for variant in EntityVariant::all() {
        for (id, _) in model.entities(*variant) {
            let lines = model.describe(id)?;
            if !lines.is_empty() {
                println!("{lines}");
            }
        }
    }
    Ok(true)
}

fn cmd_catalog(config_path: Option<&Path>) -> Result<bool> {
    let config = load_config(Path::new("."), config_path)?;
    let catalog = config.catalog().context("invalid analysis catalog")?;

    println!(
        "\n{} ({} analyses)\n{}",
        "Analysis Catalog".bold(),
        catalog.len(),
        "-".repeat(40)
    );
    for entry in catalog.entries() {
        println!(
            "  {} {} {}.{} [{}]",
            entry.name.bold(),
            "->".dimmed(),
            entry.variant,
            entry.property,
            entry.direction
        );
        println!("      output: {}", entry.output);
        println!("      filter: {}", entry.filter);
    }
    Ok(true)
}

fn cmd_init(force: bool) -> Result<bool> {
    let target = PathBuf::from(CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {CONFIG_FILE}"))?;
    println!("Created {CONFIG_FILE} with default configuration.");
    Ok(true)
}

fn load_config(search_dir: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(search_dir)),
    }
}

fn model_dir(model: &Path) -> &Path {
    match model.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn model_stem(model: &Path) -> String {
    model
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

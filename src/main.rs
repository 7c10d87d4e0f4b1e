use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperdex::config::Config;
use paperdex::vector::{self, BuildReport, IndexStore, SearchResult};
use paperdex::{Error, embedding};
use std::ffi::OsStr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "paperdex",
    version,
    about = "Build and query a nearest-neighbor index over paper abstracts"
)]
struct Cli {
    /// Configuration file (TOML). Defaults to <config_dir>/paperdex/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index directory, overriding index.directory from configuration
    #[arg(long, global = true, env = "PAPERDEX_INDEX_DIR")]
    index_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed a JSON record export and persist a fresh index
    Build {
        /// JSON array of {Title, Summary, URL, PaperID} records
        #[arg(long, default_value = "ArxivRecords.json")]
        records: PathBuf,
    },
    /// Find the papers closest to a short query
    Query {
        text: String,
        /// Number of results
        #[arg(short = 'k', long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Find the papers closest to a long text such as an abstract
    Similar {
        /// File holding the text to compare against the index
        #[arg(long)]
        file: PathBuf,
        #[arg(short = 'k', long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Describe the persisted index
    Info,
}

const ONNX_THREADS: &str = "2";

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Caps the ONNX Runtime pool on many-core machines unless the user chose.
    if let Some(threads) = onnx_thread_limit(std::env::var_os("OMP_NUM_THREADS").as_deref()) {
        // SAFETY: no other thread exists yet; the log writer and the runtime
        // are started below.
        unsafe { std::env::set_var("OMP_NUM_THREADS", threads) };
    }

    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), cli.verbose)?;
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(cli))
}

fn onnx_thread_limit(current: Option<&OsStr>) -> Option<&'static str> {
    current.is_none().then_some(ONNX_THREADS)
}

/// `RUST_LOG` when set, else `paperdex=info`. `--verbose` raises paperdex to
/// debug either way.
fn log_filter(env: Option<&str>, verbose: bool) -> Result<EnvFilter> {
    let level = if verbose { "debug" } else { "info" };
    let default = || EnvFilter::new(format!("paperdex={level}"));
    let Some(directives) = env.filter(|directives| !directives.trim().is_empty()) else {
        return Ok(default());
    };

    let mut filter = EnvFilter::try_new(directives).unwrap_or_else(|_| default());
    if verbose {
        filter = filter.add_directive("paperdex=debug".parse()?);
    }
    Ok(filter)
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(index_dir) = cli.index_dir {
        config.index.directory = index_dir;
    }

    match cli.command {
        Command::Build { records } => build(&config, records).await,
        Command::Query { text, limit, json } => {
            let limit = limit.unwrap_or(config.index.default_limit);
            let search = open_search(&config).await?;
            let results = search.query(&text, limit).await.context("query failed")?;
            print_results(&results, json)
        }
        Command::Similar { file, limit, json } => {
            let limit = limit.unwrap_or(config.index.default_limit);
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let search = open_search(&config).await?;
            let results = search
                .similar(&text, limit)
                .await
                .context("similarity search failed")?;
            print_results(&results, json)
        }
        Command::Info => info(&config).await,
    }
}

async fn build(config: &Config, records: PathBuf) -> Result<()> {
    let documents = vector::source::read_records(&records)
        .await
        .with_context(|| format!("failed to read records from {}", records.display()))?;

    let provider = load_provider(config).await?;
    let indexer = vector::document_indexer(config, provider)?;

    match indexer.build(documents).await {
        Ok((_, report)) => {
            print_report(&report);
            Ok(())
        }
        Err(Error::EmptyBuildResult { skipped }) => anyhow::bail!(
            "no documents could be indexed ({skipped} skipped); the existing index was left unchanged"
        ),
        Err(error) => Err(error).context("index build failed"),
    }
}

async fn open_search(config: &Config) -> Result<std::sync::Arc<vector::DocumentSearch>> {
    let provider = load_provider(config).await?;
    match vector::initialize_document_search(config, provider).await {
        Ok(search) => Ok(search),
        Err(Error::NotFound { path }) => anyhow::bail!(
            "no index found in {}; run `paperdex build --records <FILE>` first",
            path.display()
        ),
        Err(error) => Err(error).context("failed to open index"),
    }
}

async fn load_provider(
    config: &Config,
) -> Result<std::sync::Arc<dyn embedding::EmbeddingProvider>> {
    let embedding_config = config.embedding.clone();
    tokio::task::spawn_blocking(move || embedding::from_config(&embedding_config))
        .await
        .context("embedding model loader panicked")?
        .context("failed to load embedding model")
}

async fn info(config: &Config) -> Result<()> {
    let store = IndexStore::new(&config.index.directory);
    let Some(manifest) = store.manifest().await.context("failed to read index")? else {
        println!(
            "No index in {}. Run `paperdex build --records <FILE>` to create one.",
            config.index.directory.display()
        );
        return Ok(());
    };

    println!("Location:   {}", manifest.directory.display());
    println!("Generation: {}", manifest.generation);
    println!("Model:      {}", manifest.model);
    println!("Dimension:  {}", manifest.dimension);
    println!("Documents:  {}", manifest.count);
    println!("Created:    {}", manifest.created_at.to_rfc3339());
    Ok(())
}

fn print_report(report: &BuildReport) {
    println!(
        "Indexed {} of {} documents (dimension {}) into {}",
        report.indexed,
        report.total,
        report.dimension,
        report.location.display()
    );
    for skip in &report.skipped {
        println!(
            "  skipped #{} ({}): {}",
            skip.position,
            skip.id.as_deref().unwrap_or("no id"),
            skip.reason
        );
    }
}

fn print_results(results: &[SearchResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for result in results {
        println!("Result {}", result.rank);
        println!("Distance: {:.4}", result.distance);
        println!("Title: {}", result.title);
        println!("URL: {}", result.url);
        println!();
    }
    Ok(())
}

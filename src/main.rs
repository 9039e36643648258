//! Rerank Bench CLI
//!
//! Scores an embedding column by how well its nearest neighbours agree
//! with a reranking oracle.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rerank_bench::{
    config::Config,
    eval::{Benchmark, BenchmarkConfig, FailurePolicy, RunParams, RunReport},
    persistence::{Snapshot, load_snapshot, save_snapshot},
    rerank::{CohereReranker, CosineReranker, Reranker},
    store::{InMemoryVectorStore, PgVectorStore, VectorStore},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rerank Bench - compare embedding columns against a cross-encoder reranker
#[derive(Parser)]
#[command(name = "rerank-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the retrieval/rerank benchmark over a range of document ids
    Bench {
        /// Embedding column to evaluate (e.g. mpnet_768d, jina_768d, doc2vec_20d)
        #[arg(long)]
        emb_col: String,

        /// Table holding the documents (e.g. conversations_chunk2034char)
        #[arg(long)]
        table: String,

        /// First document id (inclusive)
        start: i64,

        /// Last document id (exclusive)
        end: i64,

        /// Number of neighbours retrieved per query
        #[arg(short = 'n', long, default_value_t = 10)]
        candidates: usize,

        /// Reranked results used for the rerank score and NDCG cutoff
        #[arg(short = 'k', long, default_value_t = 3)]
        top_k: usize,

        /// What to do when a single query fails
        #[arg(long, value_enum, default_value_t = OnError::Abort)]
        on_error: OnError,

        /// Queries evaluated concurrently
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Run against a snapshot file instead of PostgreSQL
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Reranking oracle
        #[arg(long, value_enum, default_value_t = RerankerKind::Cohere)]
        reranker: RerankerKind,

        /// Abort the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Where to write the JSON report (default: runs/<table>_<col>_<start>_<end>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump a PostgreSQL table and its embedding columns into a snapshot file
    Export {
        /// Table to export
        #[arg(long)]
        table: String,

        /// Embedding columns to include (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Snapshot path (.json or .bin)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Upsert a snapshot's documents and embeddings into PostgreSQL
    Import {
        /// Snapshot path (.json or .bin)
        snapshot: PathBuf,

        /// Target table (defaults to the snapshot's table)
        #[arg(long)]
        table: Option<String>,
    },

    /// Test database and reranker connectivity
    Test,

    /// Show the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnError {
    Abort,
    Skip,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => FailurePolicy::Abort,
            OnError::Skip => FailurePolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RerankerKind {
    /// Cohere-compatible HTTP rerank API
    Cohere,
    /// Local cosine similarity (offline baseline)
    Cosine,
}

/// The store selected for a command; PostgreSQL pools are closed on release.
enum StoreHandle {
    Postgres(PgVectorStore),
    Memory(InMemoryVectorStore),
}

impl StoreHandle {
    fn as_store(&self) -> &dyn VectorStore {
        match self {
            StoreHandle::Postgres(store) => store,
            StoreHandle::Memory(store) => store,
        }
    }

    async fn release(self) {
        if let StoreHandle::Postgres(store) = self {
            store.close().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Bench {
            emb_col,
            table,
            start,
            end,
            candidates,
            top_k,
            on_error,
            concurrency,
            snapshot,
            reranker,
            deadline_secs,
            output,
        } => {
            let params = RunParams {
                emb_col,
                table_name: table,
                test_id_range: (start, end),
                candidates,
                top_k,
                reranker: String::new(),
                on_error: on_error.into(),
                concurrency,
            };
            cmd_bench(params, snapshot, reranker, deadline_secs, output).await
        }
        Commands::Export {
            table,
            columns,
            output,
        } => cmd_export(table, columns, output).await,
        Commands::Import { snapshot, table } => cmd_import(snapshot, table).await,
        Commands::Test => cmd_test().await,
        Commands::Config => cmd_config(),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "rerank_bench=debug"
    } else {
        "rerank_bench=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_bench(
    mut params: RunParams,
    snapshot: Option<PathBuf>,
    reranker_kind: RerankerKind,
    deadline_secs: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (start, end) = params.test_id_range;
    if start > end {
        anyhow::bail!("Invalid id range {}..{}: start must not exceed end", start, end);
    }

    let config = Config::load().context("Failed to load configuration")?;

    let reranker: Box<dyn Reranker> = match reranker_kind {
        RerankerKind::Cohere => {
            config.validate_rerank().context("Invalid configuration")?;
            Box::new(CohereReranker::new(config.rerank.clone())?)
        }
        RerankerKind::Cosine => Box::new(CosineReranker::new()),
    };
    params.reranker = reranker.name().to_string();

    let store = open_store(&config, snapshot).await?;

    info!(
        emb_col = %params.emb_col,
        table_name = %params.table_name,
        start,
        end,
        candidates = params.candidates,
        top_k = params.top_k,
        reranker = %params.reranker,
        on_error = ?params.on_error,
        concurrency = params.concurrency,
        "logged parameters"
    );

    let bench_config = BenchmarkConfig {
        collection: params.table_name.clone(),
        column: params.emb_col.clone(),
        candidate_count: params.candidates,
        top_k: params.top_k,
        failure_policy: params.on_error,
        concurrency: params.concurrency,
        store_timeout: config.database.query_timeout(),
        run_deadline: deadline_secs.map(Duration::from_secs),
    };

    let ids: Vec<i64> = (start..end).collect();
    let outcome = Benchmark::new(store.as_store(), reranker.as_ref(), bench_config)
        .run(&ids)
        .await;
    store.release().await;

    let results = outcome.context("Benchmark run aborted")?;

    let report = RunReport::new(params, results);
    report.print_summary();

    let output = output.unwrap_or_else(|| RunReport::default_path(&report.params));
    report.save(&output).context("Failed to save run report")?;
    println!("Results saved to {}", output.display());

    Ok(())
}

async fn open_store(config: &Config, snapshot: Option<PathBuf>) -> Result<StoreHandle> {
    match snapshot {
        Some(path) => {
            let snapshot = load_snapshot(&path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            info!(
                path = %path.display(),
                documents = snapshot.len(),
                collection = %snapshot.collection,
                "loaded snapshot"
            );
            Ok(StoreHandle::Memory(snapshot.into_store().await?))
        }
        None => {
            config.validate_database().context("Invalid configuration")?;
            let store = PgVectorStore::connect(&config.database)
                .await
                .context("Failed to connect to PostgreSQL")?;
            Ok(StoreHandle::Postgres(store))
        }
    }
}

async fn cmd_export(table: String, columns: Vec<String>, output: PathBuf) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let store = open_store(&config, None).await?;

    let start = Instant::now();
    let outcome = Snapshot::from_store(store.as_store(), &table, columns).await;
    store.release().await;
    let snapshot = outcome.context("Failed to read documents")?;

    save_snapshot(&snapshot, &output).context("Failed to save snapshot")?;

    println!(
        "Exported {} documents from '{}' to {} in {:.2?}",
        snapshot.len(),
        table,
        output.display(),
        start.elapsed()
    );
    Ok(())
}

async fn cmd_import(path: PathBuf, table: Option<String>) -> Result<()> {
    let snapshot = load_snapshot(&path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let table = table.unwrap_or_else(|| snapshot.collection.clone());

    let config = Config::load().context("Failed to load configuration")?;
    let store = open_store(&config, None).await?;

    let outcome = snapshot.import_into(store.as_store(), &table).await;
    store.release().await;
    let count = outcome.context("Failed to import snapshot")?;

    println!("Imported {} documents into '{}'", count, table);
    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing connections...\n");

    let config = Config::load().context("Failed to load configuration")?;

    print!("PostgreSQL: ");
    match config.validate_database() {
        Err(e) => println!("not configured ({})", e),
        Ok(()) => match PgVectorStore::connect(&config.database).await {
            Ok(store) => {
                match store.health_check().await {
                    Ok(()) => println!("ok"),
                    Err(e) => println!("failed ({})", e),
                }
                store.close().await;
            }
            Err(e) => println!("failed ({})", e),
        },
    }

    print!("Reranker:   ");
    match config.validate_rerank() {
        Err(e) => println!("not configured ({})", e),
        Ok(()) => {
            let reranker = CohereReranker::new(config.rerank.clone())?;
            match reranker.test_connection().await {
                Ok(()) => println!("ok ({})", config.rerank.model),
                Err(e) => println!("failed ({})", e),
            }
        }
    }

    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration");
    println!("{}", "─".repeat(40));
    match Config::config_file_path() {
        Some(path) => println!("  Config file:     {}", path.display()),
        None => println!("  Config file:     (none)"),
    }
    println!(
        "  Database URL:    {}",
        if config.database.url.is_empty() {
            "(unset)"
        } else {
            "(set)"
        }
    );
    println!("  Max connections: {}", config.database.max_connections);
    println!("  Query timeout:   {}s", config.database.query_timeout_secs);
    println!("  Rerank API base: {}", config.rerank.api_base);
    println!("  Rerank model:    {}", config.rerank.model);
    println!("  Rerank API key:  {}", config.rerank.masked_key());
    println!("  Rerank timeout:  {}s", config.rerank.timeout_secs);
    println!("  Max retries:     {}", config.rerank.max_retries);

    Ok(())
}

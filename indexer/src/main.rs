use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crawler::{CrawlOptions, DirCrawler, HttpCrawler};
use sift_core::{codec, Config, Engine, PersistedIndex, SledStore, Store, Tokenizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Crawl, index and query a TF-IDF search database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a seed URL or a local directory into the database
    Build(BuildArgs),
    /// Rank the documents of a database against a query
    Search {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, short)]
        query: String,
        /// Number of results to print
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// Print the document count and build metadata of a database
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Seed URL; may be repeated
    #[arg(long, required_unless_present = "dir", conflicts_with = "dir")]
    seed: Vec<String>,
    /// Index the html, txt and md files under this directory instead of crawling
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Output sled database directory
    #[arg(long)]
    db: PathBuf,
    /// Pipeline settings as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 2)]
    depth: usize,
    #[arg(long, default_value_t = 5)]
    concurrency: usize,
    #[arg(long, default_value_t = 10_000)]
    max_pages: usize,
    /// Follow links to other hosts
    #[arg(long, default_value_t = false)]
    any_host: bool,
    /// Index workers
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long, default_value_t = false)]
    lowercase: bool,
    #[arg(long, default_value_t = false)]
    nfkc: bool,
    #[arg(long, default_value_t = false)]
    stem: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => build(args).await,
        Commands::Search { db, query, k } => search(db, &query, k),
        Commands::Stats { db } => stats(db),
    }
}

fn load_config(args: &BuildArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Config::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(w) = args.workers {
        config.index_workers = w;
    }
    config.normalization.lowercase |= args.lowercase;
    config.normalization.nfkc |= args.nfkc;
    config.normalization.stem |= args.stem;
    Ok(config)
}

async fn build(args: BuildArgs) -> Result<()> {
    let config = load_config(&args)?;
    let store = Arc::new(SledStore::open(&args.db).with_context(|| format!("opening {}", args.db.display()))?);
    let engine = Engine::open(store, config)?;
    tracing::info!(db = %args.db.display(), restored = engine.corpus_size(), "index opened");

    let handle = match &args.dir {
        Some(dir) => engine.build_index(DirCrawler::new(dir.clone(), args.max_pages)),
        None => {
            let seeds = args.seed.iter().map(|s| HttpCrawler::parse_seed(s)).collect::<Result<Vec<_>>>()?;
            let options = CrawlOptions {
                max_depth: args.depth,
                max_pages: args.max_pages,
                concurrency: args.concurrency,
                same_host_only: !args.any_host,
                ..Default::default()
            };
            engine.build_index(HttpCrawler::new(seeds, options)?)
        }
    };

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; draining what was crawled so far");
            cancel.cancel();
        }
    });

    let stats = handle.wait().await?;
    engine.store().close()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn open_existing(db: &Path) -> Result<SledStore> {
    if !db.exists() {
        bail!("no database at {}", db.display());
    }
    Ok(SledStore::open(db)?)
}

fn search(db: PathBuf, query: &str, k: usize) -> Result<()> {
    let store = open_existing(&db)?;
    let normalization = codec::load_meta(&store)?.map(|m| m.normalization).unwrap_or_default();
    let tokenizer = Tokenizer::new(normalization);
    let hits = sift_core::search::rank(&PersistedIndex::new(&store), &tokenizer, query, Some(k))?;
    if hits.is_empty() {
        println!("no results");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{:>3}. {:.4}  {}", i + 1, hit.score, hit.url);
    }
    Ok(())
}

fn stats(db: PathBuf) -> Result<()> {
    let store = open_existing(&db)?;
    let doc_count = codec::load_doc_count(&store)?;
    let meta = codec::load_meta(&store)?;
    let out = serde_json::json!({ "doc_count": doc_count, "meta": meta });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

//! Corpus build tool
//!
//! Turns a JSON Lines file of `{title, text, url?}` records into an embedded
//! corpus snapshot that the API server loads at startup.

use anyhow::{anyhow, Result};
use clap::Parser;
use claim_core::bert::fetch_model;
use claim_core::builder::DEFAULT_BATCH_SIZE;
use claim_core::embeddings::hashing::DEFAULT_HASHING_DIM;
use claim_core::{BertEmbedder, CorpusBuilder, Embedder, EmbedderBackend, HashingEmbedder};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "claim-build")]
#[command(version, about = "Build an embedded corpus snapshot for the claim API")]
struct Args {
    /// JSON Lines file of passage records
    #[arg(short, long)]
    input: PathBuf,

    /// Snapshot file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Embedding backend: hashing or bert
    #[arg(long, default_value = "hashing")]
    embedder: String,

    /// Local model directory for the bert backend
    #[arg(long, conflicts_with = "model_repo")]
    model_path: Option<PathBuf>,

    /// Hugging Face repository to download for the bert backend
    #[arg(long)]
    model_repo: Option<String>,

    /// Dimension for the hashing backend
    #[arg(long, default_value_t = DEFAULT_HASHING_DIM)]
    dim: usize,

    /// Texts embedded per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

fn load_embedder(args: &Args) -> Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match args.embedder.parse::<EmbedderBackend>()? {
        EmbedderBackend::Hashing => Box::new(HashingEmbedder::new(args.dim)?),
        EmbedderBackend::Bert => {
            let dir = match (&args.model_path, &args.model_repo) {
                (Some(path), _) => path.clone(),
                (None, Some(repo)) => fetch_model(repo)?,
                (None, None) => {
                    return Err(anyhow!("--model-path or --model-repo is required for the bert embedder"))
                }
            };
            Box::new(BertEmbedder::load(&dir)?)
        }
    };
    Ok(embedder)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("claim_build=info".parse()?)
                .add_directive("claim_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let started = Instant::now();

    let embedder = load_embedder(&args)?;
    tracing::info!(
        "Embedding with {} (dimension {})",
        embedder.model_id(),
        embedder.dimension()
    );

    let store = CorpusBuilder::new(embedder.as_ref())
        .with_batch_size(args.batch_size)
        .build_from_jsonl(&args.input)?;
    store.write(&args.output)?;

    tracing::info!(
        "Built {} passages into {} in {:.1}s",
        store.len(),
        args.output.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

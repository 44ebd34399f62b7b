//! saltree-server binary

use std::path::PathBuf;

use clap::Parser;
use saltree_core::{HashAlgorithm, RetrievalConfig};
use saltree_server::{metrics, ServerBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saltree-server")]
#[command(about = "Serve verifiable record retrieval from a salted hash tree")]
struct Args {
    /// JSON config file; defaults to ./saltree-data layout
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory used when no config file is given
    #[arg(long, default_value = "./saltree-data")]
    data_dir: PathBuf,

    /// Seed records file (one hex record per line), overrides config
    #[arg(long)]
    records: Option<PathBuf>,

    /// Hash primitive, overrides config
    #[arg(long)]
    algorithm: Option<HashAlgorithm>,

    /// Refuse inserts beyond this many leaves
    #[arg(long)]
    max_leaves: Option<u64>,

    /// Listen port
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Disable the /metrics endpoint
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("saltree_server=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RetrievalConfig::load(path)?,
        None => RetrievalConfig::from_base_dir(&args.data_dir),
    };
    if let Some(records) = args.records {
        config.seed_records_path = Some(records);
    }
    if let Some(algorithm) = args.algorithm {
        config = config.with_algorithm(algorithm);
    }
    if let Some(max) = args.max_leaves {
        config = config.with_max_leaves(max);
    }

    tracing::info!(
        algorithm = %config.hash_algorithm,
        snapshot = ?config.snapshot_path,
        seed_records = ?config.seed_records_path,
        max_leaves = ?config.max_leaves,
        "Configuration loaded"
    );

    let mut builder = ServerBuilder::new(config).port(args.port);
    if !args.no_metrics {
        builder = builder.metrics_handle(metrics::init_prometheus_recorder()?);
    }

    let server = builder.build()?;
    let commitment = server.state().commitment();
    tracing::info!(
        port = args.port,
        leaves = commitment.leaf_count,
        root = %commitment.root,
        "Server ready"
    );
    server.run().await?;

    Ok(())
}

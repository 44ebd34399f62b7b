//! saltree-client binary: verified retrieval CLI

use clap::{Parser, Subcommand};
use saltree_client::{ClientBuilder, RetrievalMode};
use saltree_core::encoding::decode_hex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saltree-client")]
#[command(about = "Fetch records from a saltree server and verify them against its root")]
struct Args {
    /// Server URL
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,

    /// Attempts per retrieval before giving up
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the published commitment
    Root,
    /// Retrieve and verify one record
    Get {
        index: u64,
        /// Exchange to use: pir or ot
        #[arg(long, default_value = "pir")]
        mode: RetrievalMode,
    },
    /// Append a hex-encoded record
    Insert { record: String },
    /// Tombstone a record
    Remove { index: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("saltree_client=info".parse()?))
        .init();

    let args = Args::parse();
    let mut client = ClientBuilder::new(&args.server)
        .max_attempts(args.max_attempts)
        .build();

    match args.command {
        Command::Root => {
            let commitment = client.fetch_commitment().await?;
            println!("{}", serde_json::to_string_pretty(&commitment)?);
        }
        Command::Get { index, mode } => {
            client.fetch_commitment().await?;
            let record = client.retrieve(index, mode).await?;
            tracing::info!(index, %mode, len = record.len(), "Record verified");
            println!("{}", hex::encode(record));
        }
        Command::Insert { record } => {
            let bytes = decode_hex(&record)?;
            let inserted = client.insert(&bytes).await?;
            println!("{}", serde_json::to_string_pretty(&inserted.commitment)?);
            println!("index: {}", inserted.index);
        }
        Command::Remove { index } => {
            let removed = client.tombstone(index).await?;
            println!("{}", serde_json::to_string_pretty(&removed.commitment)?);
        }
    }

    Ok(())
}

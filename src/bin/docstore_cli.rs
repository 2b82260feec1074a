//! Minimal demonstration CLI wiring a `SqliteStorage` shard to a
//! `CollectionManager`. Grounded on `src/bin/sqrld.rs`'s argument/config/
//! logging wiring; not part of the core contract.

use clap::Parser;
use docstore::config::CoreConfig;
use docstore::{CollectionManager, QueryOptions};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "docstore", about = "Document collection engine demo CLI", version)]
struct Args {
  #[arg(long, env = "DOCSTORE_SQLITE_PATH")]
  sqlite: Option<String>,
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  let mut config = if let Some(path) = &args.config {
    CoreConfig::from_file(path)?
  } else {
    CoreConfig::find_and_load()?.unwrap_or_default()
  };

  if let Some(path) = args.sqlite {
    config.sqlite.path = path;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let storage = Arc::new(docstore::db::SqliteStorage::open(&config.sqlite.path).await?);
  let manager = CollectionManager::with_limits(storage, config.limits.clone());

  let demo = manager.collection("demo").await?;
  demo.put("hello", json!({"greeting": "hello, world"})).await?;
  let doc = demo.get("hello").await?;
  tracing::info!(?doc, "round-tripped demo document");

  let all = demo.list(&QueryOptions::default()).await?;
  tracing::info!(count = all.len(), "demo collection contents");

  Ok(())
}

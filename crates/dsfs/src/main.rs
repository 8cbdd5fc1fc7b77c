use anyhow::{Context, Result};
use clap::Parser;
use dsfs::cli::Cli;
use dsfs::FileSystem;
use dsfs_store::MemoryDatastore;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let store = match &config.store_path {
        Some(path) => Arc::new(
            MemoryDatastore::open(path)
                .with_context(|| format!("opening store {}", path.display()))?,
        ),
        None => {
            tracing::warn!("no store path configured, changes will not be kept");
            Arc::new(MemoryDatastore::new())
        }
    };
    tracing::debug!(namespace = %config.namespace, kind = %config.kind, "store opened");

    let fs = FileSystem::from_config(store.clone(), &config);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    cli.run(&fs, &mut stdin.lock(), &mut stdout.lock())?;

    store.flush().context("flushing store")?;
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::Command;
use hashdb::{HashDb, MemoryDb};
use tracing::{debug, info};
use zk_executor::config::ExecutorConfig;
use zk_executor::env::load_dotenvy_vars_if_present;
use zk_executor::service::ExecutorService;
use zk_executor::transfer::TransferExecutor;

use self::executor::*;
mod executor {
    pub mod cli;
    pub mod http;
    pub mod stdio;
}

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenvy_vars_if_present();
    zk_executor::tracing::init();

    let args = cli::Cli::parse();
    let config: ExecutorConfig = args.executor_config.into();
    info!(
        "{} starting with prover id {}",
        zk_executor::version(),
        config.prover_id
    );

    let db = Arc::new(MemoryDb::new(config.prover_id.clone()));
    spawn_flusher(db.clone(), Duration::from_millis(args.flush_interval_ms));

    let executor = Arc::new(TransferExecutor::new(db.clone()));
    let service = Arc::new(ExecutorService::new(executor, db, config));

    match args.command {
        Command::Http { port } => http::http_main(service, port).await?,
        Command::Stdio => stdio::stdio_main(service).await?,
    }

    Ok(())
}

/// Periodically persists everything written to the store.
fn spawn_flusher(db: Arc<MemoryDb>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        loop {
            interval.tick().await;
            let stored = db.flush();
            debug!("flush status {:?}, stored {stored}", db.flush_status());
        }
    });
}

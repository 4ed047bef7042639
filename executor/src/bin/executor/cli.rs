use clap::{Parser, Subcommand};
use zk_executor::config::cli::CliExecutorConfig;

const STORE_HELP_HEADING: &str = "Store options";

/// zkEVM batch executor
#[derive(Parser)]
#[command(version = zk_executor::version(), propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    #[clap(flatten)]
    pub(crate) executor_config: CliExecutorConfig,

    /// How often the store persists pending writes, in milliseconds.
    #[arg(long, env = "ZK_EXECUTOR_FLUSH_INTERVAL_MS", help_heading = STORE_HELP_HEADING, default_value_t = 1_000)]
    pub(crate) flush_interval_ms: u64,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Reads one request from stdin and writes the response to stdout.
    Stdio,
    /// Serves requests over HTTP and WebSocket.
    Http {
        /// The port on which to listen.
        #[arg(short, long, env = "ZK_EXECUTOR_PORT", default_value_t = 50071)]
        port: u16,
    },
}

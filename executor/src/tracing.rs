use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Installs the process-wide subscriber. Filtering follows `RUST_LOG`, with
/// `info` when it is unset.
pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::INFO.into())
                        .from_env_lossy(),
                ),
        )
        .init();
}

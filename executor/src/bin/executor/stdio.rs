use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use zk_executor::server::{exit_on_integration_defect, parse_request};
use zk_executor::service::{ExecutorService, ProcessBatchError};

/// The main function for the stdio mode.
pub(crate) async fn stdio_main(service: Arc<ExecutorService>) -> Result<()> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    let request = parse_request(buffer.as_bytes())?;

    let response = match service.process_batch_blocking(request).await {
        Ok(response) => response,
        Err(e @ ProcessBatchError::IntegrationDefect(_)) => exit_on_integration_defect(&e),
        Err(e) => return Err(e).context("request cancelled"),
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &response)?;
    writeln!(stdout)?;
    Ok(())
}

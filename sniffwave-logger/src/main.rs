use clap::Parser;
use sniffwave_logger::config::{CliArgs, LoggerConfig};
use sniffwave_logger::logging;
use sniffwave_logger::pipeline::Pipeline;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = LoggerConfig::load(&args)?;

    let _logging_guard = logging::init_logging(&config.log_dir, "sniffwave-logger", &config.log_level)?;

    info!("Sniffwave logger starting...");
    info!(
        "Feed: {} {} (max lines: {}, max fails: {})",
        config.program,
        config.cmd_args.join(" "),
        config.max_lines,
        config.max_fails
    );

    let pipeline = Pipeline::from_config(&config).await?;
    info!("Consumers: {}", pipeline.worker_names().join(", "));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let report = pipeline.run(cancel).await;
    report.log_summary();

    if !report.is_success() {
        anyhow::bail!("sniffwave pipeline stopped with errors");
    }
    info!("Sniffwave logger stopped");
    Ok(())
}

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli_opts = Cli::parse();

    let mut config = allowgate::config::init();
    if cli_opts.interactive {
        config.interactive = true;
    }

    let metrics_router = allowgate::metrics::init_metrics_and_logging(&config);

    tracing::info!("Starting allowgate with config: {:?}", config);

    let ctl = allowgate::run::start_services(&config).await?;

    let router = allowgate::api::router_with_defaults(&config).merge(metrics_router);
    allowgate::api::start_api(&config, ctl.clone(), router, true).await?;

    if config.interactive {
        allowgate::stdin::watch_stdin(ctl, config.admin_address).await;
        return Ok(());
    }

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
struct Cli {
    /// Watch stdin for operator commands and log prettily
    #[arg(long, default_value_t = false)]
    interactive: bool,
}

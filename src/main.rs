mod config;
mod prober;
mod report;
mod resolver;
mod scheduler;
mod stats;

use clap::{CommandFactory, Parser};
use config::{Cli, OutputFormat, ProbeConfig};
use resolver::SystemNameService;
use scheduler::{ProbeLoop, Shutdown};

use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version go to stdout and succeed; anything else is a usage error
            let code = if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
            e.print()?;
            return Ok(code);
        }
    };
    if cli.wants_help() {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = match ProbeConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{}", Cli::command().render_usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    let log_level = config.get_tracing_level()?;
    let logs = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("tcp_probe={}", log_level.as_str().to_lowercase()).parse()?));
    match config.format {
        OutputFormat::Json => logs.json().init(),
        OutputFormat::Text => logs.init(),
    }
    debug!(?config, "starting probe");

    let (shutdown_tx, shutdown_rx) = watch::channel(Shutdown::Running);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("interrupt received, stopping after the current attempt");
        let _ = shutdown_tx.send(Shutdown::Stop);
        shutdown_signal().await;
        info!("second interrupt, abandoning the current attempt");
        let _ = shutdown_tx.send(Shutdown::Abort);
    });

    let names = SystemNameService::new(config.timeout());
    let mut probe = ProbeLoop::new(config, names, std::io::stdout());
    probe.run(shutdown_rx).await?;

    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C, or SIGTERM on unix. If no handler can be installed
/// it never resolves, so the run is only bounded by its count.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot listen for SIGTERM: {e}");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        _ = ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

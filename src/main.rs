use std::process::ExitCode;

use anyhow::Context;
use env_logger::Env;
use log::{error, info};
use smart_lights::{ControllerConfig, LoopStats, bootstrap};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let shutdown = CancellationToken::new();

    let status = tokio::select! {
        result = run(shutdown.clone()) => {
            if let Err(e) = &result {
                error!("{e:#}");
            }
            bootstrap::exit_status(&result)
        }
        () = bootstrap::watch_interrupts(signal::ctrl_c, shutdown) => bootstrap::EXIT_FAILURE,
    };

    ExitCode::from(status)
}

async fn run(shutdown: CancellationToken) -> anyhow::Result<LoopStats> {
    info!("starting smart home AI controller");

    let cfg = ControllerConfig::from_env().context("invalid configuration")?;
    let stats = bootstrap::run_bootstrapped(cfg, shutdown)
        .await
        .context("startup failed")?;

    Ok(stats)
}

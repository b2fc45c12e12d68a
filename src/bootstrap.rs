use std::{future::Future, io, time::Duration};

use comms::{Publisher, SensorListener};
use log::{error, info, warn};
use machine_learning::training::ForestTrainer;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    Controller, ControllerConfig, LoopStats, Result, controller, telemetry::TelemetryFetcher,
};

/// Process status after a graceful stop.
pub const EXIT_OK: u8 = 0;
/// Process status when the controller could not start or was forced down.
pub const EXIT_FAILURE: u8 = 1;

/// How long the broker link is given to flush the disconnect.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Trains a model out of the telemetry history, connects to the broker and runs the
/// controller until `shutdown` is cancelled.
///
/// # Arguments
/// * `cfg` - The resolved configuration.
/// * `shutdown` - Stops the decision loop between two cycles once cancelled.
///
/// # Returns
/// The counters of the run, or the error that kept the controller from starting.
pub async fn run_bootstrapped(
    cfg: ControllerConfig,
    shutdown: CancellationToken,
) -> Result<LoopStats> {
    let fetcher = TelemetryFetcher::new(cfg.feed.clone())?;
    let trainer = ForestTrainer::new(cfg.forest.clone())?;
    let model = controller::startup(&fetcher, cfg.training_samples, trainer).await?;

    let mut connection = comms::connect(&cfg.broker).await;
    let listener = SensorListener::new(
        connection.transport.clone(),
        cfg.sensor_topic.as_str(),
        connection.inbox,
    );
    let publisher = Publisher::new(connection.transport, cfg.decision_topic.as_str());

    let stats = Controller::new(model, listener, publisher, cfg.cycle)
        .run(shutdown)
        .await;

    if time::timeout(DISCONNECT_GRACE, &mut connection.task).await.is_err() {
        info!("broker link still busy after {DISCONNECT_GRACE:?}, closing it");
        connection.task.abort();
    }

    info!("controller stopped");
    Ok(stats)
}

/// Maps the outcome of a run to the process exit status.
pub fn exit_status<T, E>(result: &std::result::Result<T, E>) -> u8 {
    match result {
        Ok(_) => EXIT_OK,
        Err(_) => EXIT_FAILURE,
    }
}

/// Cancels `shutdown` on the first interrupt and returns on the second one.
///
/// Never returns if interrupts can't be listened for.
///
/// # Arguments
/// * `interrupt` - Resolves once per received interrupt.
/// * `shutdown` - The token stopping the controller.
pub async fn watch_interrupts<F, Fut>(mut interrupt: F, shutdown: CancellationToken)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        error!("failed to listen for interrupts: {e}");
        return std::future::pending().await;
    }

    info!("received SIGINT, stopping after the current cycle");
    shutdown.cancel();

    if let Err(e) = interrupt().await {
        error!("failed to listen for interrupts: {e}");
        return std::future::pending().await;
    }

    warn!("received a second SIGINT, exiting now");
}

mod stats;

use std::{fmt, num::NonZeroUsize};

use comms::{Publisher, SensorListener, Transport};
use log::{debug, error, info};
use machine_learning::{arch::Classifier, training::Trainer};
use tokio::{task, time};
use tokio_util::sync::CancellationToken;

use crate::{ControllerErr, Result, config::CycleConfig, decision, telemetry::TrainingSource};

pub use stats::LoopStats;

/// The lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Fetching history and training the model.
    Startup,
    /// Model trained and broker link set up, no cycle run yet.
    Ready,
    /// Running receive-decide-publish cycles.
    Cycle,
    /// A shutdown was requested, closing the broker link.
    ShutdownRequested,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Startup => "startup",
            State::Ready => "ready",
            State::Cycle => "cycle",
            State::ShutdownRequested => "shutdown requested",
            State::Stopped => "stopped",
        };

        f.write_str(name)
    }
}

/// Fetches the training history and fits a model on it.
///
/// # Arguments
/// * `source` - Where the labeled history comes from.
/// * `samples` - How many samples to request.
/// * `trainer` - Fits the model, run on the blocking pool.
///
/// # Returns
/// The trained model, `NoTrainingData` without training when the source yields nothing,
/// or the trainer's failure.
pub async fn startup<S, Tr>(source: &S, samples: NonZeroUsize, trainer: Tr) -> Result<Tr::Model>
where
    S: TrainingSource + ?Sized,
    Tr: Trainer + Send + 'static,
    Tr::Model: Send + 'static,
{
    debug!("controller state: {}", State::Startup);
    info!("fetching training data");

    let dataset = source.fetch(samples).await;
    if dataset.is_empty() {
        error!("no training data available, cannot train the model");
        return Err(ControllerErr::NoTrainingData);
    }

    for (label, count) in dataset.label_counts() {
        info!(label = label, count = count; "training label balance");
    }

    let model = task::spawn_blocking(move || trainer.train(&dataset)).await??;
    Ok(model)
}

/// Turns live readings into published light decisions.
pub struct Controller<C, T: Transport> {
    model: C,
    listener: SensorListener<T>,
    publisher: Publisher<T>,
    cycle: CycleConfig,
    state: State,
    stats: LoopStats,
}

impl<C: Classifier, T: Transport> Controller<C, T> {
    /// Creates a new `Controller`.
    ///
    /// # Arguments
    /// * `model` - The trained classifier.
    /// * `listener` - Source of live readings.
    /// * `publisher` - Sink of decisions.
    /// * `cycle` - Per cycle timings.
    ///
    /// # Returns
    /// A controller in the `Ready` state.
    pub fn new(
        model: C,
        listener: SensorListener<T>,
        publisher: Publisher<T>,
        cycle: CycleConfig,
    ) -> Self {
        debug!("controller state: {}", State::Ready);

        Self {
            model,
            listener,
            publisher,
            cycle,
            state: State::Ready,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Runs cycles until `shutdown` is cancelled, then disconnects from the broker.
    ///
    /// Cancellation is checked between cycles, an in-flight cycle always completes.
    ///
    /// # Returns
    /// The counters of the run.
    pub async fn run(mut self, shutdown: CancellationToken) -> LoopStats {
        info!(
            sensor_topic = self.listener.topic(),
            decision_topic = self.publisher.topic();
            "controller running"
        );

        while !shutdown.is_cancelled() {
            self.transition(State::Cycle);
            self.cycle().await;
        }

        self.transition(State::ShutdownRequested);
        info!("shutting down controller");
        self.publisher.disconnect().await;

        self.transition(State::Stopped);
        self.stats.log();
        self.stats
    }

    /// Runs a single receive-decide-publish cycle.
    pub async fn cycle(&mut self) {
        self.stats.bump_cycle();

        let Some(reading) = self.listener.await_reading(self.cycle.receive_timeout).await else {
            self.stats.bump_timeout();
            return;
        };

        let decision = decision::decide(&self.model, &reading);
        let delivery = self.publisher.publish(&decision).await;
        self.stats.record_decision(decision.lights, delivery);

        time::sleep(self.cycle.cycle_sleep).await;
    }

    fn transition(&mut self, next: State) {
        if self.state != next {
            debug!("controller state: {} -> {next}", self.state);
            self.state = next;
        }
    }
}

use comms::{Delivery, msg::Lights};
use log::info;

/// Counters kept over a controller run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub timeouts: u64,
    pub lights_on: u64,
    pub lights_off: u64,
    pub publish_failures: u64,
}

impl LoopStats {
    #[inline]
    pub fn bump_cycle(&mut self) {
        self.cycles += 1;
    }

    #[inline]
    pub fn bump_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_decision(&mut self, lights: Lights, delivery: Delivery) {
        match lights {
            Lights::On => self.lights_on += 1,
            Lights::Off => self.lights_off += 1,
        }

        if delivery == Delivery::Failed {
            self.publish_failures += 1;
        }
    }

    /// Total decisions taken, published or not.
    #[inline]
    pub fn decisions(&self) -> u64 {
        self.lights_on + self.lights_off
    }

    pub fn log(&self) {
        info!(
            cycles = self.cycles,
            decisions = self.decisions(),
            lights_on = self.lights_on,
            lights_off = self.lights_off,
            timeouts = self.timeouts,
            publish_failures = self.publish_failures;
            "controller run summary"
        );
    }
}

use std::{env, num::NonZeroUsize, str::FromStr, time::Duration};

use comms::BrokerConfig;
use machine_learning::training::ForestSpec;

use crate::{ControllerErr, Result, telemetry::FeedConfig};

const DEFAULT_MQTT_HOST: &str = "ia.ic.polyu.edu.hk";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_CLIENT_ID: &str = "smart_home_ai_controller";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
const DEFAULT_SENSOR_TOPIC: &str = "sensors/temperature";
const DEFAULT_DECISION_TOPIC: &str = "smart_home/ai_decision";
const DEFAULT_FEED_URL: &str = "https://api.thingspeak.com";
const DEFAULT_FEED_CHANNEL_ID: u64 = 2920063;
const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRAINING_SAMPLES: usize = 300;
const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CYCLE_SLEEP_MS: u64 = 10;

/// Undelivered sensor messages buffered between the broker link and the listener.
const INBOX_CAPACITY: usize = 64;

/// Timing of a single receive-decide-publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    /// How long a cycle waits for a reading.
    pub receive_timeout: Duration,
    /// Pause after a published decision.
    pub cycle_sleep: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
            cycle_sleep: Duration::from_millis(DEFAULT_CYCLE_SLEEP_MS),
        }
    }
}

/// Everything the controller needs to run, resolved once at start up.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub broker: BrokerConfig,
    pub sensor_topic: String,
    pub decision_topic: String,
    pub feed: FeedConfig,
    pub training_samples: NonZeroUsize,
    pub cycle: CycleConfig,
    pub forest: ForestSpec,
}

impl ControllerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration out of `lookup`, falling back to the defaults for every
    /// variable it doesn't know or maps to an empty value.
    ///
    /// # Arguments
    /// * `lookup` - Resolves a variable name to its raw value.
    ///
    /// # Returns
    /// The configuration or a `ControllerErr::Config` naming the first malformed variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let broker = BrokerConfig {
            host: vars.string("MQTT_HOST", DEFAULT_MQTT_HOST),
            port: vars.parse("MQTT_PORT", DEFAULT_MQTT_PORT)?,
            client_id: vars.string("MQTT_CLIENT_ID", DEFAULT_CLIENT_ID),
            keep_alive: Duration::from_secs(
                vars.parse("MQTT_KEEP_ALIVE_SECS", DEFAULT_KEEP_ALIVE_SECS)?,
            ),
            connect_timeout: Duration::from_secs(
                vars.parse("MQTT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            ),
            reconnect_delay: Duration::from_millis(
                vars.parse("MQTT_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)?,
            ),
            inbox_capacity: INBOX_CAPACITY,
        };

        let feed = FeedConfig {
            endpoint: vars.string("FEED_URL", DEFAULT_FEED_URL),
            channel_id: vars.parse("FEED_CHANNEL_ID", DEFAULT_FEED_CHANNEL_ID)?,
            api_key: vars.string("FEED_API_KEY", ""),
            timeout: Duration::from_secs(vars.parse("FEED_TIMEOUT_SECS", DEFAULT_FEED_TIMEOUT_SECS)?),
        };

        let cycle = CycleConfig {
            receive_timeout: Duration::from_millis(
                vars.parse("RECEIVE_TIMEOUT_MS", DEFAULT_RECEIVE_TIMEOUT_MS)?,
            ),
            cycle_sleep: Duration::from_millis(vars.parse("CYCLE_SLEEP_MS", DEFAULT_CYCLE_SLEEP_MS)?),
        };

        let defaults = ForestSpec::default();
        let forest = ForestSpec {
            n_trees: vars.parse("FOREST_TREES", defaults.n_trees)?,
            seed: vars.parse("FOREST_SEED", defaults.seed)?,
            ..defaults
        };

        if forest.n_trees == 0 {
            return Err(ControllerErr::Config {
                var: "FOREST_TREES",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let training_samples = NonZeroUsize::new(
            vars.parse("TRAINING_SAMPLES", DEFAULT_TRAINING_SAMPLES)?,
        )
        .ok_or_else(|| ControllerErr::Config {
            var: "TRAINING_SAMPLES",
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        })?;

        Ok(Self {
            broker,
            sensor_topic: vars.string("SENSOR_TOPIC", DEFAULT_SENSOR_TOPIC),
            decision_topic: vars.string("DECISION_TOPIC", DEFAULT_DECISION_TOPIC),
            feed,
            training_samples,
            cycle,
            forest,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.raw(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: ToString,
    {
        let Some(value) = self.raw(var) else {
            return Ok(default);
        };

        value.parse().map_err(|e: T::Err| ControllerErr::Config {
            var,
            reason: e.to_string(),
            value,
        })
    }
}

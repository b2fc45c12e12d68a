use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{self, Instant};

use crate::{Inbox, Transport, msg::Reading};

/// Waits for live readings on the sensor topic.
pub struct SensorListener<T: Transport> {
    transport: T,
    topic: String,
    inbox: Inbox,
    subscribed: Option<u64>,
}

impl<T: Transport> SensorListener<T> {
    /// Creates a new `SensorListener`.
    ///
    /// # Arguments
    /// * `transport` - The broker link used to subscribe.
    /// * `topic` - The sensor topic.
    /// * `inbox` - Where the broker link delivers inbound messages.
    ///
    /// # Returns
    /// A new `SensorListener` instance, not subscribed yet.
    pub fn new(transport: T, topic: impl Into<String>, inbox: Inbox) -> Self {
        Self {
            transport,
            topic: topic.into(),
            inbox,
            subscribed: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits up to `timeout` for the next decodable reading on the sensor topic.
    ///
    /// Messages that fail to decode are logged and skipped, the wait goes on until the
    /// original deadline.
    ///
    /// # Arguments
    /// * `timeout` - The longest this call may wait.
    ///
    /// # Returns
    /// The reading, or `None` on timeout or if the broker link is gone.
    pub async fn await_reading(&mut self, timeout: Duration) -> Option<Reading> {
        self.ensure_subscribed().await;

        let deadline = Instant::now() + timeout;

        loop {
            let msg = match time::timeout_at(deadline, self.inbox.recv()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    error!("broker link closed, no more sensor readings");
                    return None;
                }
                Err(_) => {
                    warn!("no sensor reading received within {timeout:?}");
                    return None;
                }
            };

            if msg.topic != self.topic {
                debug!("ignoring message on {}", msg.topic);
                continue;
            }

            match Reading::decode(&msg.payload) {
                Ok(reading) => {
                    info!(
                        temperature = reading.temperature,
                        light = reading.light,
                        occupancy = reading.occupancy;
                        "received sensor reading"
                    );
                    return Some(reading);
                }
                Err(e) => error!("error parsing sensor reading: {e}"),
            }
        }
    }

    /// Subscribes once per broker session.
    async fn ensure_subscribed(&mut self) {
        let session = self.transport.session();
        if self.subscribed == Some(session) {
            return;
        }

        match self.transport.subscribe(&self.topic).await {
            Ok(()) => {
                debug!(session = session; "subscribed to {}", self.topic);
                self.subscribed = Some(session);
            }
            Err(e) => warn!("failed to subscribe to {}: {e}", self.topic),
        }
    }
}

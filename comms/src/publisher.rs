use log::{error, info};

use crate::{Transport, msg::Decision};

/// The outcome of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Delivery {
    Sent,
    Failed,
}

/// Sends decisions to the decision topic.
pub struct Publisher<T: Transport> {
    transport: T,
    topic: String,
}

impl<T: Transport> Publisher<T> {
    /// Creates a new `Publisher`.
    ///
    /// # Arguments
    /// * `transport` - The broker link used to publish.
    /// * `topic` - The decision topic.
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `decision` as `{"lights": .., "timestamp": ..}`.
    ///
    /// Failures are logged and reported, never propagated.
    pub async fn publish(&self, decision: &Decision) -> Delivery {
        let payload = match decision.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to publish decision: {e}");
                return Delivery::Failed;
            }
        };

        match self.transport.publish(&self.topic, payload).await {
            Ok(()) => {
                info!("decision published to {}", self.topic);
                Delivery::Sent
            }
            Err(e) => {
                error!("failed to publish decision to {}: {e}", self.topic);
                Delivery::Failed
            }
        }
    }

    /// Closes the underlying broker link.
    pub async fn disconnect(&self) {
        match self.transport.disconnect().await {
            Ok(()) => info!("broker client disconnected"),
            Err(e) => error!("failed to disconnect from broker: {e}"),
        }
    }
}

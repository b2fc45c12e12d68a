pub mod error;
mod listener;
pub mod msg;
mod publisher;
mod transport;

pub use error::{CommsErr, Result};
pub use listener::SensorListener;
pub use publisher::{Delivery, Publisher};
pub use transport::{BrokerConfig, Connection, Inbound, Inbox, MqttTransport, Transport, connect};

use std::{error::Error, fmt};

/// The comms module's result type.
pub type Result<T> = std::result::Result<T, CommsErr>;

/// Messaging failures.
#[derive(Debug)]
pub enum CommsErr {
    /// The broker link is down, nothing was handed to the client.
    NotConnected,
    /// The MQTT client refused the request.
    Client(rumqttc::ClientError),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    InvalidPayload {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for CommsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsErr::NotConnected => write!(f, "not connected to the broker"),
            CommsErr::Client(e) => write!(f, "mqtt client error: {e}"),
            CommsErr::Encode(e) => write!(f, "failed to encode payload: {e}"),
            CommsErr::Decode(e) => write!(f, "failed to decode payload: {e}"),
            CommsErr::InvalidPayload { field, reason } => {
                write!(f, "invalid payload: {field} {reason}")
            }
        }
    }
}

impl Error for CommsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommsErr::Client(e) => Some(e),
            CommsErr::Encode(e) | CommsErr::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rumqttc::ClientError> for CommsErr {
    fn from(value: rumqttc::ClientError) -> Self {
        Self::Client(value)
    }
}

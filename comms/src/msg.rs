use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CommsErr, Result};

/// One live sensor sample as published on the sensor topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub light: f64,
    pub occupancy: i64,
}

impl Reading {
    /// Decodes a sensor payload of the form `{"temperature": .., "light": .., "occupancy": ..}`.
    ///
    /// Missing fields default to zero. Numbers, numeric strings and booleans are accepted,
    /// a fractional occupancy is truncated.
    ///
    /// # Arguments
    /// * `payload` - The raw message body.
    ///
    /// # Returns
    /// The decoded reading or an error if the payload isn't a JSON object or a field
    /// isn't a finite number.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload).map_err(CommsErr::Decode)?;
        let Value::Object(fields) = value else {
            return Err(CommsErr::InvalidPayload {
                field: "payload",
                reason: "is not a JSON object",
            });
        };

        Ok(Self {
            temperature: float_field(&fields, "temperature")?,
            light: float_field(&fields, "light")?,
            occupancy: int_field(&fields, "occupancy")?,
        })
    }

    /// Returns the feature vector `(temperature, light, occupancy)`.
    #[inline]
    pub fn features(&self) -> [f64; 3] {
        [self.temperature, self.light, self.occupancy as f64]
    }
}

fn float_field(fields: &Map<String, Value>, field: &'static str) -> Result<f64> {
    let invalid = CommsErr::InvalidPayload {
        field,
        reason: "is not a number",
    };

    let value = match fields.get(field) {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64().ok_or(invalid)?,
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid)?,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(_) => return Err(invalid),
    };

    if !value.is_finite() {
        return Err(CommsErr::InvalidPayload {
            field,
            reason: "is not finite",
        });
    }

    Ok(value)
}

fn int_field(fields: &Map<String, Value>, field: &'static str) -> Result<i64> {
    let invalid = CommsErr::InvalidPayload {
        field,
        reason: "is not an integer",
    };

    match fields.get(field) {
        None => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid),
        Some(Value::Bool(b)) => Ok(i64::from(*b)),
        Some(_) => Err(invalid),
    }
}

/// The state the lights are switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Lights {
    On,
    Off,
}

impl fmt::Display for Lights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lights::On => write!(f, "ON"),
            Lights::Off => write!(f, "OFF"),
        }
    }
}

/// A light switch instruction, published on the decision topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub lights: Lights,
    /// Seconds since the unix epoch, with sub-second precision.
    pub timestamp: f64,
}

impl Decision {
    /// Creates a new `Decision` stamped with the current time.
    pub fn now(lights: Lights) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        Self { lights, timestamp }
    }

    /// Serializes the decision into its flat JSON form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CommsErr::Encode)
    }
}

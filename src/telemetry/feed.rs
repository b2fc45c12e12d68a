use std::fmt;

use log::warn;
use machine_learning::dataset::{Dataset, Sample};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FeedErr;

const TEMPERATURE: &str = "field1";
const LIGHT: &str = "field2";
const OCCUPANCY: &str = "field3";
const LIGHT_SWITCH: &str = "field4";

#[derive(Deserialize)]
struct FeedBody {
    #[serde(default)]
    feeds: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    NotAnObject,
    Missing(&'static str),
    NotNumeric(&'static str),
    NotFinite(&'static str),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "entry is not an object"),
            Self::Missing(field) => write!(f, "{field} is missing"),
            Self::NotNumeric(field) => write!(f, "{field} is not numeric"),
            Self::NotFinite(field) => write!(f, "{field} is not finite"),
        }
    }
}

/// Turns a feed response body into a training dataset.
///
/// Entries map `field1..field4` to temperature, light, occupancy and light switch. Values
/// may be numbers or numeric strings, an entry is only kept when all four are present and
/// finite. Skipped entries are logged, a body without a `feeds` array is an empty feed.
///
/// # Arguments
/// * `body` - The raw response body.
///
/// # Returns
/// The retained samples in feed order, or an error if the body isn't a JSON object.
pub fn parse_feed(body: &[u8]) -> Result<Dataset, FeedErr> {
    let body: FeedBody = serde_json::from_slice(body)?;

    let dataset = body
        .feeds
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| match parse_entry(entry) {
            Ok(sample) => Some(sample),
            Err(skip) => {
                match entry.get("entry_id") {
                    Some(id) => warn!("skipping feed entry {id}: {skip}"),
                    None => warn!("skipping feed entry: {skip}"),
                }
                None
            }
        })
        .collect();

    Ok(dataset)
}

fn parse_entry(entry: &Value) -> Result<Sample, Skip> {
    if !entry.is_object() {
        return Err(Skip::NotAnObject);
    }

    Ok(Sample {
        temperature: field(entry, TEMPERATURE)?,
        light: field(entry, LIGHT)?,
        occupancy: field(entry, OCCUPANCY)?.trunc() as i64,
        light_switch: field(entry, LIGHT_SWITCH)?.trunc() as i64,
    })
}

fn field(entry: &Value, name: &'static str) -> Result<f64, Skip> {
    let value = match entry.get(name) {
        None | Some(Value::Null) => return Err(Skip::Missing(name)),
        Some(Value::Number(n)) => n.as_f64().ok_or(Skip::NotNumeric(name))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Skip::NotNumeric(name))?,
        Some(_) => return Err(Skip::NotNumeric(name)),
    };

    if !value.is_finite() {
        return Err(Skip::NotFinite(name));
    }

    Ok(value)
}

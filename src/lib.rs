pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod decision;
pub mod error;
pub mod telemetry;

pub use config::{ControllerConfig, CycleConfig};
pub use controller::{Controller, LoopStats, State};
pub use error::{ControllerErr, Result};

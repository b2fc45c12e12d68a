use std::{error::Error, fmt};

use machine_learning::MlErr;

/// The controller's result type.
pub type Result<T> = std::result::Result<T, ControllerErr>;

/// Failures that stop the controller before it reaches its decision loop.
#[derive(Debug)]
pub enum ControllerErr {
    /// A configuration variable holds a value that can't be used.
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },
    /// The telemetry feed yielded no usable sample.
    NoTrainingData,
    Training(MlErr),
    Feed(FeedErr),
    /// The training task panicked or was cancelled.
    Join(tokio::task::JoinError),
}

impl fmt::Display for ControllerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { var, value, reason } => {
                write!(f, "invalid config: {var}={value:?} {reason}")
            }
            Self::NoTrainingData => write!(f, "no training data available"),
            Self::Training(e) => write!(f, "training failed: {e}"),
            Self::Feed(e) => write!(f, "telemetry feed: {e}"),
            Self::Join(e) => write!(f, "training task failed: {e}"),
        }
    }
}

impl Error for ControllerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Training(e) => Some(e),
            Self::Feed(e) => Some(e),
            Self::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for ControllerErr {
    fn from(e: MlErr) -> Self {
        Self::Training(e)
    }
}

impl From<FeedErr> for ControllerErr {
    fn from(e: FeedErr) -> Self {
        Self::Feed(e)
    }
}

impl From<tokio::task::JoinError> for ControllerErr {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e)
    }
}

/// Telemetry feed failures. The fetcher degrades all of them to an empty dataset.
#[derive(Debug)]
pub enum FeedErr {
    Http(reqwest::Error),
    Status(u16),
    Body(serde_json::Error),
}

impl fmt::Display for FeedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http error: {e}"),
            Self::Status(code) => write!(f, "unexpected status HTTP {code}"),
            Self::Body(e) => write!(f, "malformed body: {e}"),
        }
    }
}

impl Error for FeedErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Body(e) => Some(e),
            Self::Status(_) => None,
        }
    }
}

impl From<reqwest::Error> for FeedErr {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for FeedErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Body(e)
    }
}

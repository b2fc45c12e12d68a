mod feed;
mod fetcher;

use std::num::NonZeroUsize;

use async_trait::async_trait;
use machine_learning::dataset::Dataset;

pub use crate::error::FeedErr;
pub use feed::parse_feed;
pub use fetcher::{FeedConfig, TelemetryFetcher};

/// Somewhere historical labeled readings can be pulled from.
#[async_trait]
pub trait TrainingSource: Send + Sync {
    /// Returns up to `max_results` samples, empty when none could be obtained.
    async fn fetch(&self, max_results: NonZeroUsize) -> Dataset;
}

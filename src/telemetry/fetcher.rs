use std::{num::NonZeroUsize, time::Duration};

use async_trait::async_trait;
use log::{error, info};
use machine_learning::dataset::Dataset;

use super::{TrainingSource, parse_feed};
use crate::error::FeedErr;

/// Where the historical feed lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Base URL of the telemetry service.
    pub endpoint: String,
    pub channel_id: u64,
    /// Read key of the channel, sent as is. May be empty for public channels.
    pub api_key: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

/// Fetches labeled historical readings from the telemetry HTTP API.
pub struct TelemetryFetcher {
    client: reqwest::Client,
    cfg: FeedConfig,
}

impl TelemetryFetcher {
    /// Creates a new `TelemetryFetcher`.
    ///
    /// # Arguments
    /// * `cfg` - The feed location and request timeout.
    ///
    /// # Returns
    /// The fetcher, or an error if the HTTP client can't be built.
    pub fn new(cfg: FeedConfig) -> Result<Self, FeedErr> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self { client, cfg })
    }

    /// The channel's feed URL, without the query.
    pub fn feed_url(&self) -> String {
        format!(
            "{}/channels/{}/feeds.json",
            self.cfg.endpoint.trim_end_matches('/'),
            self.cfg.channel_id
        )
    }

    /// Fetches up to `max_results` of the most recent feed entries.
    ///
    /// Every failure is logged and degrades to an empty dataset.
    pub async fn fetch(&self, max_results: NonZeroUsize) -> Dataset {
        match self.try_fetch(max_results).await {
            Ok(dataset) if dataset.is_empty() => {
                error!("no valid data fetched from the telemetry feed");
                dataset
            }
            Ok(dataset) => {
                info!(samples = dataset.len(); "fetched training samples");
                dataset
            }
            Err(e) => {
                error!("failed to fetch telemetry data: {e}");
                Dataset::empty()
            }
        }
    }

    async fn try_fetch(&self, max_results: NonZeroUsize) -> Result<Dataset, FeedErr> {
        let results = max_results.to_string();
        let resp = self
            .client
            .get(self.feed_url())
            .query(&[
                ("api_key", self.cfg.api_key.as_str()),
                ("results", results.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedErr::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        parse_feed(&body)
    }
}

#[async_trait]
impl TrainingSource for TelemetryFetcher {
    async fn fetch(&self, max_results: NonZeroUsize) -> Dataset {
        TelemetryFetcher::fetch(self, max_results).await
    }
}

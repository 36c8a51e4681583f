//! Retrieval across the committee's REST endpoints.

use crate::config::DataAvailabilityConfig;
use crate::reader_stats::{ReaderId, ReaderStat, ReaderStats, SharedReaderStats};
use crate::redundant::{first_success, merge_expiration_policies};
use crate::strategy::{strategy_from_config, AggregatorStrategy, TrackedReader};
use async_trait::async_trait;
use das_client::RestfulDasClient;
use das_schema::pretty::pretty_hash;
use das_schema::{
    hash_to_hex, valid_hash, DasError, DataAvailabilityReader, DataAvailabilityStatus,
    ExpirationPolicy, Hash32, Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retrieves blobs by trying batches of readers chosen by a strategy.
#[derive(Debug)]
pub struct ReaderAggregator {
    readers: Vec<TrackedReader>,
    strategy: Box<dyn AggregatorStrategy>,
    stats: SharedReaderStats,
    request_timeout: Option<Duration>,
}

impl ReaderAggregator {
    pub fn new(
        readers: Vec<Arc<dyn DataAvailabilityReader>>,
        strategy: Box<dyn AggregatorStrategy>,
        max_per_endpoint_stats: usize,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        if readers.is_empty() {
            return Err(DasError::Config(
                "reader aggregator needs at least one reader".into(),
            ));
        }
        let readers: Vec<TrackedReader> = readers
            .into_iter()
            .enumerate()
            .map(|(id, reader)| TrackedReader { id, reader })
            .collect();
        let stats = SharedReaderStats::new(max_per_endpoint_stats);
        strategy.update(&readers, stats.snapshot());
        Ok(Self {
            readers,
            strategy,
            stats,
            request_timeout,
        })
    }

    /// Build a reader aggregator over the REST endpoints in `config.rest_aggregator`.
    pub fn from_config(config: &DataAvailabilityConfig) -> Result<Self> {
        let rest = &config.rest_aggregator;
        let timeout = config.request_timeout();
        let readers = rest
            .urls
            .iter()
            .map(|url| {
                let client = match timeout {
                    Some(t) => RestfulDasClient::with_timeout(url, t)?,
                    None => RestfulDasClient::new(url)?,
                };
                Ok(Arc::new(client) as Arc<dyn DataAvailabilityReader>)
            })
            .collect::<Result<Vec<_>>>()?;
        let strategy = strategy_from_config(rest)?;
        Self::new(readers, strategy, rest.max_per_endpoint_stats, timeout)
    }

    /// Snapshot of the per-reader statistics.
    pub fn stats(&self) -> HashMap<ReaderId, ReaderStats> {
        self.stats.snapshot()
    }

    pub fn readers(&self) -> impl Iterator<Item = &Arc<dyn DataAvailabilityReader>> {
        self.readers.iter().map(|r| &r.reader)
    }

    async fn retrieve(&self, hash: &Hash32) -> Result<Vec<u8>> {
        self.strategy.update(&self.readers, self.stats.snapshot());
        let mut plan = self.strategy.new_instance();
        let transport_error = Arc::new(Mutex::new(None));

        loop {
            let batch = plan.next_readers();
            if batch.is_empty() {
                break;
            }
            debug!(
                "querying {} readers for {}",
                batch.len(),
                pretty_hash(hash)
            );
            let requests = batch
                .into_iter()
                .map(|tracked| {
                    fetch_one(tracked, *hash, self.stats.clone(), transport_error.clone())
                })
                .collect();
            if let Ok(data) = first_success(requests).await {
                return Ok(data);
            }
        }

        let last = transport_error.lock().take();
        match last {
            Some(err) => Err(DasError::NoReadersResponded(Box::new(err))),
            None => Err(DasError::NotFound),
        }
    }
}

/// Fetch from one reader, validate and record the outcome.
async fn fetch_one(
    tracked: TrackedReader,
    hash: Hash32,
    stats: SharedReaderStats,
    transport_error: Arc<Mutex<Option<DasError>>>,
) -> Result<Vec<u8>> {
    let start = Instant::now();
    let result = tracked.reader.get_by_hash(&hash).await;
    let latency = start.elapsed();

    let outcome = match result {
        Ok(data) if valid_hash(&hash, &data) => Ok(data),
        Ok(_) => {
            warn!(
                "reader {} returned data not matching {}",
                tracked.reader,
                pretty_hash(&hash)
            );
            Err(DasError::InvalidHash {
                expected: hash_to_hex(&hash),
            })
        }
        Err(e) if e.is_not_found() => Err(e),
        Err(e) => {
            debug!("reader {} failed: {}", tracked.reader, e);
            let message = e.to_string();
            *transport_error.lock() = Some(e);
            Err(DasError::Transport(message))
        }
    };
    stats.record(
        tracked.id,
        ReaderStat {
            latency,
            success: outcome.is_ok(),
        },
    );
    outcome
}

impl fmt::Display for ReaderAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReaderAggregator{{readers:{}}}", self.readers.len())
    }
}

#[async_trait]
impl DataAvailabilityStatus for ReaderAggregator {
    async fn health_check(&self) -> Result<()> {
        for tracked in &self.readers {
            tracked.reader.health_check().await?;
        }
        Ok(())
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        merge_expiration_policies(self.readers()).await
    }
}

#[async_trait]
impl DataAvailabilityReader for ReaderAggregator {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.retrieve(hash))
                .await
                .map_err(|_| DasError::Timeout(limit))?,
            None => self.retrieve(hash).await,
        }
    }
}

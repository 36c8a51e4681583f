//! Hedged reads across a set of equivalent readers.

use async_trait::async_trait;
use das_schema::pretty::pretty_hash;
use das_schema::{
    DasError, DataAvailabilityReader, DataAvailabilityStatus, ExpirationPolicy, Hash32, Result,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, trace};

/// Run `requests` concurrently and return the first success.
///
/// Remaining requests are aborted once a result is returned, or when the
/// returned future is dropped. If every request fails the last error is
/// returned.
pub async fn first_success<T, F>(requests: Vec<F>) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    if requests.is_empty() {
        error!("redundant read issued with no readers");
        return Err(DasError::Logic("redundant read over an empty reader set"));
    }

    let mut tasks = JoinSet::new();
    for request in requests {
        tasks.spawn(request);
    }

    let mut last_err = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = Some(e),
            Err(e) => last_err = Some(DasError::Transport(format!("reader task failed: {}", e))),
        }
    }
    Err(last_err.unwrap_or(DasError::Logic("redundant read finished without a result")))
}

/// Merge the expiration policies of redundant readers.
///
/// Readers are asked in order; a reader reporting `KeepForever` decides the
/// result, otherwise the first error is returned.
pub async fn merge_expiration_policies<'a, I>(readers: I) -> Result<ExpirationPolicy>
where
    I: IntoIterator<Item = &'a Arc<dyn DataAvailabilityReader>>,
{
    let mut policies = Vec::new();
    for reader in readers {
        let policy = reader.expiration_policy().await?;
        if policy == ExpirationPolicy::KeepForever {
            return Ok(policy);
        }
        policies.push(policy);
    }
    ExpirationPolicy::most_permissive(policies)
        .ok_or_else(|| DasError::Config("no readers to report an expiration policy".into()))
}

/// Queries every reader at once and returns whichever answers first.
pub struct RedundantSimpleDasReader {
    inners: Vec<Arc<dyn DataAvailabilityReader>>,
}

impl RedundantSimpleDasReader {
    pub fn new(inners: Vec<Arc<dyn DataAvailabilityReader>>) -> Result<Self> {
        if inners.is_empty() {
            return Err(DasError::Config(
                "redundant reader needs at least one inner reader".into(),
            ));
        }
        Ok(Self { inners })
    }
}

impl fmt::Debug for RedundantSimpleDasReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RedundantSimpleDasReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedundantSimpleDasReader{{")?;
        for (i, inner) in self.inners.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", inner)?;
        }
        write!(f, "}}")
    }
}

#[async_trait]
impl DataAvailabilityStatus for RedundantSimpleDasReader {
    async fn health_check(&self) -> Result<()> {
        for inner in &self.inners {
            inner.health_check().await?;
        }
        Ok(())
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        merge_expiration_policies(&self.inners).await
    }
}

#[async_trait]
impl DataAvailabilityReader for RedundantSimpleDasReader {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        trace!("RedundantSimpleDasReader get_by_hash {}", pretty_hash(hash));
        let key = *hash;
        let requests = self
            .inners
            .iter()
            .map(|inner| {
                let inner = inner.clone();
                async move { inner.get_by_hash(&key).await }
            })
            .collect();
        first_success(requests).await
    }
}

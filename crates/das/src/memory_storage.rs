//! In-process storage, used in tests and as a fallback primary when no data
//! directory is configured.

use async_trait::async_trait;
use das_schema::pretty::pretty_hash;
use das_schema::{
    content_hash, DasError, DataAvailabilityReader, DataAvailabilityStatus, ExpirationPolicy,
    Hash32, Result, StorageService,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Keeps every blob in memory until the process exits; expirations are ignored.
#[derive(Debug, Default)]
pub struct MemoryStorageService {
    data: RwLock<HashMap<Hash32, Vec<u8>>>,
}

impl MemoryStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl fmt::Display for MemoryStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryStorageService")
    }
}

#[async_trait]
impl DataAvailabilityStatus for MemoryStorageService {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        Ok(ExpirationPolicy::KeepForever)
    }
}

#[async_trait]
impl DataAvailabilityReader for MemoryStorageService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        trace!("MemoryStorageService get_by_hash {}", pretty_hash(hash));
        self.data.read().get(hash).cloned().ok_or(DasError::NotFound)
    }
}

#[async_trait]
impl StorageService for MemoryStorageService {
    async fn put(&self, data: &[u8], _expiration: u64) -> Result<()> {
        let key = content_hash(data);
        trace!("MemoryStorageService put {}", pretty_hash(&key));
        self.data.write().insert(key, data.to_vec());
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

//! Read-only adapters that let a reader stand in where a storage or full
//! service capability is expected.
//!
//! Calling a write operation on them means the node was wired incorrectly,
//! so writes fail with [`DasError::Logic`].

use async_trait::async_trait;
use das_schema::{
    DasError, DataAvailabilityCertificate, DataAvailabilityReader, DataAvailabilityStatus,
    DataAvailabilityWriter, ExpirationPolicy, Hash32, Result, StorageService,
};
use std::fmt;
use std::sync::Arc;
use tracing::error;

fn logic_error(what: &'static str) -> DasError {
    error!("logic error: {}", what);
    DasError::Logic(what)
}

pub struct ReadLimitedStorageService {
    inner: Arc<dyn DataAvailabilityReader>,
}

impl ReadLimitedStorageService {
    pub fn new(inner: Arc<dyn DataAvailabilityReader>) -> Self {
        Self { inner }
    }
}

impl fmt::Display for ReadLimitedStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadLimitedStorageService({})", self.inner)
    }
}

#[async_trait]
impl DataAvailabilityStatus for ReadLimitedStorageService {
    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        self.inner.expiration_policy().await
    }
}

#[async_trait]
impl DataAvailabilityReader for ReadLimitedStorageService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        self.inner.get_by_hash(hash).await
    }
}

#[async_trait]
impl StorageService for ReadLimitedStorageService {
    async fn put(&self, _data: &[u8], _expiration: u64) -> Result<()> {
        Err(logic_error("ReadLimitedStorageService.put shouldn't be called"))
    }

    async fn sync(&self) -> Result<()> {
        Err(logic_error("ReadLimitedStorageService.sync shouldn't be called"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct ReadLimitedDataAvailabilityService {
    inner: Arc<dyn DataAvailabilityReader>,
}

impl ReadLimitedDataAvailabilityService {
    pub fn new(inner: Arc<dyn DataAvailabilityReader>) -> Self {
        Self { inner }
    }
}

impl fmt::Display for ReadLimitedDataAvailabilityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadLimitedDataAvailabilityService({})", self.inner)
    }
}

#[async_trait]
impl DataAvailabilityStatus for ReadLimitedDataAvailabilityService {
    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        self.inner.expiration_policy().await
    }
}

#[async_trait]
impl DataAvailabilityReader for ReadLimitedDataAvailabilityService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        self.inner.get_by_hash(hash).await
    }
}

#[async_trait]
impl DataAvailabilityWriter for ReadLimitedDataAvailabilityService {
    async fn store(
        &self,
        _message: &[u8],
        _timeout: u64,
        _sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        Err(logic_error(
            "ReadLimitedDataAvailabilityService.store shouldn't be called",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MockReader, ReaderBehavior};
    use das_schema::content_hash;

    fn reader() -> Arc<dyn DataAvailabilityReader> {
        Arc::new(MockReader::new("inner", ReaderBehavior::Serve(b"data".to_vec())))
    }

    #[tokio::test]
    async fn test_storage_writes_are_logic_errors() {
        let storage = ReadLimitedStorageService::new(reader());
        assert!(storage.put(b"data", 0).await.unwrap_err().is_fatal());
        assert!(storage.sync().await.unwrap_err().is_fatal());
        assert!(storage.close().await.is_ok());
        assert_eq!(
            storage.get_by_hash(&content_hash(b"data")).await.unwrap(),
            b"data".to_vec()
        );
        assert_eq!(storage.to_string(), "ReadLimitedStorageService(MockReader{inner})");
    }

    #[tokio::test]
    async fn test_service_store_is_logic_error() {
        let service = ReadLimitedDataAvailabilityService::new(reader());
        let err = service.store(b"data", 0, &[]).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(service.health_check().await.is_ok());
    }
}

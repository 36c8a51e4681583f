//! Capability traits implemented by clients, aggregators and decorators.
//!
//! Decorators hold an inner capability and implement the same trait,
//! forwarding every method explicitly.

use crate::certificate::DataAvailabilityCertificate;
use crate::error::Result;
use crate::expiration::ExpirationPolicy;
use crate::Hash32;
use async_trait::async_trait;
use std::fmt;

/// Liveness and retention information every DA service reports.
#[async_trait]
pub trait DataAvailabilityStatus: Send + Sync + fmt::Display {
    async fn health_check(&self) -> Result<()>;

    async fn expiration_policy(&self) -> Result<ExpirationPolicy>;
}

/// Retrieval of blobs by content hash.
#[async_trait]
pub trait DataAvailabilityReader: DataAvailabilityStatus {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>>;
}

/// Storage of blobs with a committee (or one committee member).
///
/// `sig` authorizes the write; it is an anti-spam measure, not an integrity
/// check on `message`.
#[async_trait]
pub trait DataAvailabilityWriter: Send + Sync + fmt::Display {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<DataAvailabilityCertificate>;
}

/// A committee member as seen by the store aggregator.
pub trait DataAvailabilityBackend: DataAvailabilityWriter + DataAvailabilityStatus {}

impl<T: DataAvailabilityWriter + DataAvailabilityStatus + ?Sized> DataAvailabilityBackend for T {}

/// Full read/write DA capability.
pub trait DataAvailabilityService: DataAvailabilityReader + DataAvailabilityWriter {}

impl<T: DataAvailabilityReader + DataAvailabilityWriter + ?Sized> DataAvailabilityService for T {}

/// Local storage a node reads through and backfills into.
#[async_trait]
pub trait StorageService: DataAvailabilityReader {
    /// Store `data` under its content hash until `expiration` (unix seconds).
    async fn put(&self, data: &[u8], expiration: u64) -> Result<()>;

    /// Flush buffered writes.
    async fn sync(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

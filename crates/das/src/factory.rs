//! Wires configuration into a ready-to-use DA stack.

use crate::aggregator::Aggregator;
use crate::config::DataAvailabilityConfig;
use crate::fallback::FallbackStorageService;
use crate::local_db_storage::LocalDbStorageService;
use crate::memory_storage::MemoryStorageService;
use crate::read_limited::ReadLimitedDataAvailabilityService;
use crate::reader_aggregator::ReaderAggregator;
use crate::store_signing::{DataSigner, StoreSigningDas};
use async_trait::async_trait;
use das_schema::{
    DasError, DataAvailabilityCertificate, DataAvailabilityReader, DataAvailabilityService,
    DataAvailabilityStatus, DataAvailabilityWriter, ExpirationPolicy, Hash32, Result,
    StorageService,
};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// The services a node uses, built from one configuration.
pub struct DataAvailabilityComponents {
    /// Full capability: reads through `reader`, writes through `writer` or
    /// fails with a logic error when no writer is configured.
    pub service: Arc<dyn DataAvailabilityService>,
    pub reader: Arc<dyn DataAvailabilityReader>,
    pub writer: Option<Arc<dyn DataAvailabilityWriter>>,
    pub aggregator: Option<Arc<Aggregator>>,
    /// Local read-through storage, when the fallback is enabled.
    pub storage: Option<Arc<dyn StorageService>>,
}

impl fmt::Debug for DataAvailabilityComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAvailabilityComponents")
            .field("service", &self.service.to_string())
            .field("has_writer", &self.writer.is_some())
            .field("has_storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

/// Reads from one service and writes through another.
pub struct ReadWriteService {
    reader: Arc<dyn DataAvailabilityReader>,
    writer: Arc<dyn DataAvailabilityWriter>,
}

impl ReadWriteService {
    pub fn new(reader: Arc<dyn DataAvailabilityReader>, writer: Arc<dyn DataAvailabilityWriter>) -> Self {
        Self { reader, writer }
    }
}

impl fmt::Display for ReadWriteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReadWriteService(reader:{}, writer:{})", self.reader, self.writer)
    }
}

#[async_trait]
impl DataAvailabilityStatus for ReadWriteService {
    async fn health_check(&self) -> Result<()> {
        self.reader.health_check().await
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        self.reader.expiration_policy().await
    }
}

#[async_trait]
impl DataAvailabilityReader for ReadWriteService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        self.reader.get_by_hash(hash).await
    }
}

#[async_trait]
impl DataAvailabilityWriter for ReadWriteService {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        self.writer.store(message, timeout, sig).await
    }
}

/// Build the DA components described by `config`.
///
/// Retrieval must be enabled. When `signer` is given, stores through the
/// aggregator are signed with it.
pub fn setup_data_availability(
    config: &DataAvailabilityConfig,
    signer: Option<DataSigner>,
) -> Result<DataAvailabilityComponents> {
    if !config.rest_aggregator.enable {
        return Err(DasError::Config(
            "rest_aggregator must be enabled to retrieve data".into(),
        ));
    }

    let reader_aggregator: Arc<dyn DataAvailabilityReader> =
        Arc::new(ReaderAggregator::from_config(config)?);

    let (reader, storage): (Arc<dyn DataAvailabilityReader>, Option<Arc<dyn StorageService>>) =
        if config.fallback.enable {
            let primary: Arc<dyn StorageService> = match &config.fallback.data_dir {
                Some(dir) => Arc::new(LocalDbStorageService::open(dir)?),
                None => Arc::new(MemoryStorageService::new()),
            };
            let fallback = Arc::new(FallbackStorageService::new(
                primary,
                reader_aggregator,
                config.fallback.retention_seconds,
                config.fallback.ignore_retention_write_errors,
                config.fallback.prevent_recursive_gets,
            ));
            let storage: Arc<dyn StorageService> = fallback.clone();
            (fallback as Arc<dyn DataAvailabilityReader>, Some(storage))
        } else {
            (reader_aggregator, None)
        };

    let (aggregator, writer) = if config.aggregator.enable {
        let aggregator = Arc::new(Aggregator::from_config(config)?);
        let writer: Arc<dyn DataAvailabilityWriter> = match signer {
            Some(signer) => Arc::new(StoreSigningDas::new(aggregator.clone(), signer)?),
            None => aggregator.clone(),
        };
        (Some(aggregator), Some(writer))
    } else {
        (None, None)
    };

    let service: Arc<dyn DataAvailabilityService> = match &writer {
        Some(writer) => Arc::new(ReadWriteService::new(reader.clone(), writer.clone())),
        None => Arc::new(ReadLimitedDataAvailabilityService::new(reader.clone())),
    };
    info!("DA service configured: {}", service);

    Ok(DataAvailabilityComponents {
        service,
        reader,
        writer,
        aggregator,
        storage,
    })
}

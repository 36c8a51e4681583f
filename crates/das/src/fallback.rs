//! Read-through storage with backfill from a backup reader.
//!
//! Reads go to the primary storage first. On a miss the backup is queried
//! and valid data is written back into the primary so later reads are
//! served locally. Writes go to the primary only.

use async_trait::async_trait;
use das_schema::pretty::pretty_hash;
use das_schema::{
    unix_now, valid_hash, DasError, DataAvailabilityReader, DataAvailabilityStatus,
    ExpirationPolicy, Hash32, Result, StorageService,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Marks a key as being fetched from the backup until dropped.
struct FetchGuard<'a> {
    in_flight: &'a RwLock<HashSet<Hash32>>,
    key: Hash32,
}

impl<'a> FetchGuard<'a> {
    /// `None` if the key is already marked by an outer call.
    fn acquire(in_flight: &'a RwLock<HashSet<Hash32>>, key: Hash32) -> Option<Self> {
        let inserted = in_flight.write().insert(key);
        inserted.then(|| Self { in_flight, key })
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.write().remove(&self.key);
    }
}

pub struct FallbackStorageService {
    primary: Arc<dyn StorageService>,
    backup: Arc<dyn DataAvailabilityReader>,
    /// Retention of backfilled data; `u64::MAX` keeps it forever.
    backup_retention_seconds: u64,
    ignore_retention_write_errors: bool,
    /// Answer not-found to a lookup of a key that is already being fetched
    /// from the backup. Needed when the backup can read back through this
    /// service.
    prevent_recursive_gets: bool,
    currently_fetching: RwLock<HashSet<Hash32>>,
}

impl FallbackStorageService {
    pub fn new(
        primary: Arc<dyn StorageService>,
        backup: Arc<dyn DataAvailabilityReader>,
        backup_retention_seconds: u64,
        ignore_retention_write_errors: bool,
        prevent_recursive_gets: bool,
    ) -> Self {
        Self {
            primary,
            backup,
            backup_retention_seconds,
            ignore_retention_write_errors,
            prevent_recursive_gets,
            currently_fetching: RwLock::new(HashSet::new()),
        }
    }

    fn is_fetching(&self, key: &Hash32) -> bool {
        self.currently_fetching.read().contains(key)
    }
}

impl fmt::Debug for FallbackStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for FallbackStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FallbackStorageService(primary:{}, backup:{})",
            self.primary, self.backup
        )
    }
}

#[async_trait]
impl DataAvailabilityStatus for FallbackStorageService {
    async fn health_check(&self) -> Result<()> {
        self.primary.health_check().await?;
        self.backup.health_check().await
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        self.primary.expiration_policy().await
    }
}

#[async_trait]
impl DataAvailabilityReader for FallbackStorageService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        trace!("FallbackStorageService get_by_hash {}", pretty_hash(hash));
        let recursive = self.prevent_recursive_gets && self.is_fetching(hash);
        if recursive {
            trace!("recursive lookup of {}, reporting not found", pretty_hash(hash));
            return Err(DasError::NotFound);
        }

        match self.primary.get_by_hash(hash).await {
            Ok(data) => return Ok(data),
            Err(e) => trace!("primary miss for {} ({}), trying backup", pretty_hash(hash), e),
        }

        let guard = if self.prevent_recursive_gets {
            FetchGuard::acquire(&self.currently_fetching, *hash)
        } else {
            None
        };
        let fetched = self.backup.get_by_hash(hash).await;
        drop(guard);
        let data = fetched?;

        if valid_hash(hash, &data) {
            let expiration = unix_now().saturating_add(self.backup_retention_seconds);
            if let Err(e) = self.primary.put(&data, expiration).await {
                if !self.ignore_retention_write_errors {
                    return Err(e);
                }
                warn!("failed to retain {} in primary: {}", pretty_hash(hash), e);
            }
        }
        Ok(data)
    }
}

#[async_trait]
impl StorageService for FallbackStorageService {
    async fn put(&self, data: &[u8], expiration: u64) -> Result<()> {
        self.primary.put(data, expiration).await
    }

    async fn sync(&self) -> Result<()> {
        self.primary.sync().await
    }

    async fn close(&self) -> Result<()> {
        self.primary.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_storage::MemoryStorageService;
    use crate::test_util::{MockReader, ReaderBehavior};
    use das_schema::{content_hash, ErrorKind};
    use parking_lot::Mutex;
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;
    use tokio::sync::Notify;

    const DAY: u64 = 24 * 60 * 60;

    /// Memory storage that records put expirations and can refuse writes.
    #[derive(Default)]
    struct RecordingStorage {
        inner: MemoryStorageService,
        expirations: Mutex<Vec<u64>>,
        fail_puts: bool,
    }

    impl fmt::Display for RecordingStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "RecordingStorage")
        }
    }

    #[async_trait]
    impl DataAvailabilityStatus for RecordingStorage {
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
            Ok(ExpirationPolicy::DiscardAfterDataTimeout)
        }
    }

    #[async_trait]
    impl DataAvailabilityReader for RecordingStorage {
        async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
            self.inner.get_by_hash(hash).await
        }
    }

    #[async_trait]
    impl StorageService for RecordingStorage {
        async fn put(&self, data: &[u8], expiration: u64) -> Result<()> {
            if self.fail_puts {
                return Err(DasError::Storage("disk full".into()));
            }
            self.expirations.lock().push(expiration);
            self.inner.put(data, expiration).await
        }

        async fn sync(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Backup that blocks until released.
    #[derive(Default)]
    struct BlockingBackup {
        data: Vec<u8>,
        entered: Notify,
        release: Notify,
    }

    impl fmt::Display for BlockingBackup {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "BlockingBackup")
        }
    }

    #[async_trait]
    impl DataAvailabilityStatus for BlockingBackup {
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
            Ok(ExpirationPolicy::KeepForever)
        }
    }

    #[async_trait]
    impl DataAvailabilityReader for BlockingBackup {
        async fn get_by_hash(&self, _hash: &Hash32) -> Result<Vec<u8>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.data.clone())
        }
    }

    /// Backup that reads back through the fallback service before answering.
    #[derive(Default)]
    struct RecursiveBackup {
        data: Vec<u8>,
        fallback: OnceLock<Weak<FallbackStorageService>>,
        inner_results: Mutex<Vec<ErrorKind>>,
    }

    impl fmt::Display for RecursiveBackup {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "RecursiveBackup")
        }
    }

    #[async_trait]
    impl DataAvailabilityStatus for RecursiveBackup {
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
            Ok(ExpirationPolicy::KeepForever)
        }
    }

    #[async_trait]
    impl DataAvailabilityReader for RecursiveBackup {
        async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
            let fallback = self
                .fallback
                .get()
                .and_then(Weak::upgrade)
                .ok_or_else(|| DasError::Transport("fallback gone".into()))?;
            if let Err(e) = fallback.get_by_hash(hash).await {
                self.inner_results.lock().push(e.kind());
            }
            Ok(self.data.clone())
        }
    }

    fn fallback_over(
        primary: Arc<dyn StorageService>,
        backup: Arc<dyn DataAvailabilityReader>,
        retention: u64,
        ignore_write_errors: bool,
    ) -> FallbackStorageService {
        FallbackStorageService::new(primary, backup, retention, ignore_write_errors, true)
    }

    #[tokio::test]
    async fn test_backfills_primary() {
        let data = b"batch from the committee".to_vec();
        let key = content_hash(&data);
        let primary = Arc::new(RecordingStorage::default());
        let backup = Arc::new(MockReader::new("backup", ReaderBehavior::Serve(data.clone())));
        let fallback = fallback_over(primary.clone(), backup.clone(), 21 * DAY, true);

        let before = unix_now();
        assert_eq!(fallback.get_by_hash(&key).await.unwrap(), data);
        assert_eq!(primary.inner.get_by_hash(&key).await.unwrap(), data);
        let expirations = primary.expirations.lock().clone();
        assert_eq!(expirations.len(), 1);
        assert!(expirations[0] >= before + 21 * DAY);

        // Served from the primary now
        assert_eq!(fallback.get_by_hash(&key).await.unwrap(), data);
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test]
    async fn test_retention_saturates() {
        let data = b"keep forever".to_vec();
        let primary = Arc::new(RecordingStorage::default());
        let backup = Arc::new(MockReader::new("backup", ReaderBehavior::Serve(data.clone())));
        let fallback = fallback_over(primary.clone(), backup, u64::MAX, true);

        fallback.get_by_hash(&content_hash(&data)).await.unwrap();
        assert_eq!(*primary.expirations.lock(), vec![u64::MAX]);
    }

    #[tokio::test]
    async fn test_write_back_failure() {
        let data = b"batch".to_vec();
        let key = content_hash(&data);
        let failing = || {
            Arc::new(RecordingStorage {
                fail_puts: true,
                ..Default::default()
            })
        };
        let backup = Arc::new(MockReader::new("backup", ReaderBehavior::Serve(data.clone())));

        let ignoring = fallback_over(failing(), backup.clone(), DAY, true);
        assert_eq!(ignoring.get_by_hash(&key).await.unwrap(), data);

        let strict = fallback_over(failing(), backup, DAY, false);
        assert_eq!(
            strict.get_by_hash(&key).await.unwrap_err().kind(),
            ErrorKind::Storage
        );
    }

    #[tokio::test]
    async fn test_invalid_backup_data_not_retained() {
        let primary = Arc::new(RecordingStorage::default());
        let backup = Arc::new(MockReader::new("backup", ReaderBehavior::Garbage));
        let fallback = fallback_over(primary.clone(), backup, DAY, false);

        let key = content_hash(b"expected");
        assert_eq!(fallback.get_by_hash(&key).await.unwrap(), b"garbage".to_vec());
        assert!(primary.expirations.lock().is_empty());
        assert!(primary.inner.is_empty());
    }

    #[tokio::test]
    async fn test_backup_miss_propagates() {
        let backup = Arc::new(MockReader::new("backup", ReaderBehavior::NotFound));
        let fallback = fallback_over(Arc::new(MemoryStorageService::new()), backup, DAY, true);
        assert!(fallback.get_by_hash(&[1u8; 32]).await.unwrap_err().is_not_found());
        assert!(fallback.currently_fetching.read().is_empty());
    }

    #[tokio::test]
    async fn test_recursive_backup_sees_not_found() {
        let data = b"recursive".to_vec();
        let key = content_hash(&data);
        let backup = Arc::new(RecursiveBackup {
            data: data.clone(),
            ..Default::default()
        });
        let fallback = Arc::new(fallback_over(
            Arc::new(MemoryStorageService::new()),
            backup.clone(),
            DAY,
            true,
        ));
        backup
            .fallback
            .set(Arc::downgrade(&fallback))
            .unwrap_or_else(|_| panic!("fallback already set"));

        let got = tokio::time::timeout(Duration::from_secs(5), fallback.get_by_hash(&key))
            .await
            .expect("recursive lookup should not deadlock")
            .unwrap();
        assert_eq!(got, data);
        assert_eq!(*backup.inner_results.lock(), vec![ErrorKind::NotFound]);
    }

    #[tokio::test]
    async fn test_concurrent_miss_reports_not_found() {
        let data = b"concurrent".to_vec();
        let key = content_hash(&data);
        let backup = Arc::new(BlockingBackup {
            data: data.clone(),
            ..Default::default()
        });
        let fallback = Arc::new(fallback_over(
            Arc::new(MemoryStorageService::new()),
            backup.clone(),
            DAY,
            true,
        ));

        let first = tokio::spawn({
            let fallback = fallback.clone();
            async move { fallback.get_by_hash(&key).await }
        });
        backup.entered.notified().await;

        let second = fallback.get_by_hash(&key).await.unwrap_err();
        assert!(second.is_not_found());

        backup.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), data);
        assert!(fallback.currently_fetching.read().is_empty());
        // Backfilled by the first lookup
        assert_eq!(fallback.get_by_hash(&key).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_mark_cleared_when_lookup_cancelled() {
        let backup = Arc::new(BlockingBackup::default());
        let fallback = Arc::new(fallback_over(
            Arc::new(MemoryStorageService::new()),
            backup.clone(),
            DAY,
            true,
        ));

        let key = [7u8; 32];
        let lookup = tokio::spawn({
            let fallback = fallback.clone();
            async move { fallback.get_by_hash(&key).await }
        });
        backup.entered.notified().await;
        assert!(fallback.is_fetching(&key));

        lookup.abort();
        assert!(lookup.await.unwrap_err().is_cancelled());
        assert!(!fallback.is_fetching(&key));
    }

    #[tokio::test]
    async fn test_health_requires_both() {
        let healthy = fallback_over(
            Arc::new(MemoryStorageService::new()),
            Arc::new(MockReader::new("ok", ReaderBehavior::NotFound)),
            DAY,
            true,
        );
        assert!(healthy.health_check().await.is_ok());

        let unhealthy = fallback_over(
            Arc::new(MemoryStorageService::new()),
            Arc::new(MockReader::new("down", ReaderBehavior::Fail)),
            DAY,
            true,
        );
        assert!(unhealthy.health_check().await.is_err());
        assert_eq!(
            unhealthy.expiration_policy().await.unwrap(),
            ExpirationPolicy::KeepForever
        );
    }
}

//! Persistent storage backed by sled.
//!
//! Each blob is stored under its content hash. The value is the expiration
//! time (u64 big-endian unix seconds) followed by the blob itself. Expired
//! entries read as not found; they are removed on open and on every `sync`
//! by [`LocalDbStorageService::prune_expired`].

use async_trait::async_trait;
use das_schema::pretty::pretty_hash;
use das_schema::{
    content_hash, unix_now, DasError, DataAvailabilityReader, DataAvailabilityStatus,
    ExpirationPolicy, Hash32, Result, StorageService,
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const EXPIRY_LEN: usize = 8;

fn storage_err(err: sled::Error) -> DasError {
    DasError::Storage(err.to_string())
}

fn split_value(value: &[u8]) -> Result<(u64, &[u8])> {
    if value.len() < EXPIRY_LEN {
        return Err(DasError::Storage(format!(
            "corrupt entry of {} bytes",
            value.len()
        )));
    }
    let (expiry, data) = value.split_at(EXPIRY_LEN);
    let mut buf = [0u8; EXPIRY_LEN];
    buf.copy_from_slice(expiry);
    Ok((u64::from_be_bytes(buf), data))
}

pub struct LocalDbStorageService {
    db: sled::Db,
    path: Option<PathBuf>,
}

impl LocalDbStorageService {
    /// Open or create a store in `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(storage_err)?;
        debug!("opened local DAS storage at {}", path.display());
        let storage = Self {
            db,
            path: Some(path.to_path_buf()),
        };
        storage.prune_expired()?;
        Ok(storage)
    }

    /// Create a temporary store that is deleted on drop (for testing).
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        Ok(Self { db, path: None })
    }

    /// Remove every entry whose expiration has passed. Returns the number removed.
    pub fn prune_expired(&self) -> Result<usize> {
        let now = unix_now();
        let mut removed = 0;
        for entry in self.db.iter() {
            let (key, value) = entry.map_err(storage_err)?;
            let (expiry, _) = split_value(&value)?;
            if expiry < now {
                self.db.remove(key).map_err(storage_err)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("pruned {} expired entries", removed);
        }
        Ok(removed)
    }
}

impl fmt::Display for LocalDbStorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "LocalDbStorageService({})", path.display()),
            None => write!(f, "LocalDbStorageService(temporary)"),
        }
    }
}

#[async_trait]
impl DataAvailabilityStatus for LocalDbStorageService {
    async fn health_check(&self) -> Result<()> {
        self.db.get(b"__health__").map_err(storage_err)?;
        Ok(())
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        Ok(ExpirationPolicy::DiscardAfterDataTimeout)
    }
}

#[async_trait]
impl DataAvailabilityReader for LocalDbStorageService {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        trace!("LocalDbStorageService get_by_hash {}", pretty_hash(hash));
        let value = self
            .db
            .get(hash)
            .map_err(storage_err)?
            .ok_or(DasError::NotFound)?;
        let (expiry, data) = split_value(&value)?;
        if expiry < unix_now() {
            return Err(DasError::NotFound);
        }
        Ok(data.to_vec())
    }
}

#[async_trait]
impl StorageService for LocalDbStorageService {
    async fn put(&self, data: &[u8], expiration: u64) -> Result<()> {
        let key = content_hash(data);
        trace!("LocalDbStorageService put {}", pretty_hash(&key));
        let mut value = Vec::with_capacity(EXPIRY_LEN + data.len());
        value.extend_from_slice(&expiration.to_be_bytes());
        value.extend_from_slice(data);
        self.db.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        self.prune_expired()?;
        self.db.flush_async().await.map_err(storage_err)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

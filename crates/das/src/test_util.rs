//! Mock committee members and readers for unit tests.

use crate::service_details::ServiceDetails;
use async_trait::async_trait;
use das_schema::bls::{self, SecretKey};
use das_schema::{
    content_hash, DasError, DataAvailabilityCertificate, DataAvailabilityReader,
    DataAvailabilityStatus, DataAvailabilityWriter, ExpirationPolicy, Hash32, Result,
    CERTIFICATE_VERSION,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendBehavior {
    Honest,
    Fail,
    Hang,
    Slow(Duration),
    WrongHash,
    BadSignature,
}

/// Committee member signing with a deterministic key.
pub(crate) struct MockBackend {
    index: u8,
    sk: SecretKey,
    behavior: BackendBehavior,
    stored: RwLock<HashMap<Hash32, Vec<u8>>>,
}

impl MockBackend {
    pub(crate) fn new(index: u8, behavior: BackendBehavior) -> Self {
        let (_, sk) = bls::keys_from_ikm(&[index + 1; 32]).unwrap();
        Self {
            index,
            sk,
            behavior,
            stored: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn stored(&self, hash: &Hash32) -> Option<Vec<u8>> {
        self.stored.read().get(hash).cloned()
    }
}

impl fmt::Display for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockBackend{{{}}}", self.index)
    }
}

#[async_trait]
impl DataAvailabilityWriter for MockBackend {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        _sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        match self.behavior {
            BackendBehavior::Fail => return Err(DasError::Transport("connection refused".into())),
            BackendBehavior::Hang => std::future::pending::<()>().await,
            BackendBehavior::Slow(delay) => tokio::time::sleep(delay).await,
            _ => {}
        }

        let mut data_hash = content_hash(message);
        if self.behavior == BackendBehavior::WrongHash {
            data_hash[0] ^= 0xff;
        }
        let signed = if self.behavior == BackendBehavior::BadSignature {
            b"something else".to_vec()
        } else {
            DataAvailabilityCertificate::signable_message(&data_hash, timeout)
        };
        self.stored.write().insert(content_hash(message), message.to_vec());

        Ok(DataAvailabilityCertificate {
            data_hash,
            timeout,
            signers_mask: 1 << self.index,
            sig: bls::sign(&self.sk, &signed),
            keyset_hash: [0u8; 32],
            version: CERTIFICATE_VERSION,
        })
    }
}

#[async_trait]
impl DataAvailabilityStatus for MockBackend {
    async fn health_check(&self) -> Result<()> {
        match self.behavior {
            BackendBehavior::Fail => Err(DasError::Transport("unhealthy".into())),
            _ => Ok(()),
        }
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        Ok(ExpirationPolicy::DiscardAfterDataTimeout)
    }
}

/// Committee members also serve what they stored.
#[async_trait]
impl DataAvailabilityReader for MockBackend {
    async fn get_by_hash(&self, hash: &Hash32) -> Result<Vec<u8>> {
        match self.behavior {
            BackendBehavior::Fail => Err(DasError::Transport("connection refused".into())),
            BackendBehavior::Hang => std::future::pending().await,
            _ => self.stored(hash).ok_or(DasError::NotFound),
        }
    }
}

/// Build a committee whose member `i` has mask bit `i`.
pub(crate) fn committee(behaviors: &[BackendBehavior]) -> (Vec<ServiceDetails>, Vec<Arc<MockBackend>>) {
    let backends: Vec<Arc<MockBackend>> = behaviors
        .iter()
        .enumerate()
        .map(|(i, b)| Arc::new(MockBackend::new(i as u8, *b)))
        .collect();
    let services = backends
        .iter()
        .map(|backend| {
            let pk = backend.sk.sk_to_pk();
            ServiceDetails::new(
                backend.clone(),
                pk,
                1 << backend.index,
                format!("mock_{}", backend.index),
            )
            .unwrap()
        })
        .collect();
    (services, backends)
}

#[derive(Debug, Clone)]
pub(crate) enum ReaderBehavior {
    Serve(Vec<u8>),
    ServeAfter(Vec<u8>, Duration),
    NotFound,
    Fail,
    Hang,
    Garbage,
}

pub(crate) struct MockReader {
    name: String,
    behavior: ReaderBehavior,
    policy: Option<ExpirationPolicy>,
    calls: AtomicUsize,
}

impl MockReader {
    pub(crate) fn new(name: &str, behavior: ReaderBehavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            policy: Some(ExpirationPolicy::DiscardAfterDataTimeout),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_policy(mut self, policy: Option<ExpirationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl fmt::Display for MockReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockReader{{{}}}", self.name)
    }
}

#[async_trait]
impl DataAvailabilityStatus for MockReader {
    async fn health_check(&self) -> Result<()> {
        match self.behavior {
            ReaderBehavior::Fail => Err(DasError::Transport("unhealthy".into())),
            _ => Ok(()),
        }
    }

    async fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        self.policy
            .ok_or_else(|| DasError::Transport("policy unavailable".into()))
    }
}

#[async_trait]
impl DataAvailabilityReader for MockReader {
    async fn get_by_hash(&self, _hash: &Hash32) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ReaderBehavior::Serve(data) => Ok(data.clone()),
            ReaderBehavior::ServeAfter(data, delay) => {
                tokio::time::sleep(*delay).await;
                Ok(data.clone())
            }
            ReaderBehavior::NotFound => Err(DasError::NotFound),
            ReaderBehavior::Fail => Err(DasError::Transport("connection reset".into())),
            ReaderBehavior::Hang => std::future::pending().await,
            ReaderBehavior::Garbage => Ok(b"garbage".to_vec()),
        }
    }
}

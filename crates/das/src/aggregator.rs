//! Store aggregation across the committee.
//!
//! A store is broadcast to every committee member in parallel. Each member
//! returns a partial BLS signature over the certificate's signable message;
//! once `assumed_honest` distinct members have returned a valid signature the
//! partial signatures are aggregated into a [`DataAvailabilityCertificate`].
//! Outstanding requests are aborted as soon as the outcome is decided.

use crate::config::DataAvailabilityConfig;
use crate::service_details::{setup_services, ServiceDetails};
use async_trait::async_trait;
use das_schema::bls::{self, Signature};
use das_schema::pretty::pretty_hash;
use das_schema::{
    content_hash, hash_to_hex, DasError, DataAvailabilityCertificate, DataAvailabilityWriter,
    Hash32, Keyset, Result, CERTIFICATE_VERSION,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Maximum committee size; the signer mask is a `u64`.
pub const MAX_COMMITTEE_SIZE: usize = das_schema::keyset::MAX_KEYSET_SIZE;

/// Fans stores out to the committee and assembles certificates.
#[derive(Debug)]
pub struct Aggregator {
    services: Vec<ServiceDetails>,
    keyset: Keyset,
    keyset_hash: Hash32,
    keyset_bytes: Vec<u8>,
    request_timeout: Option<Duration>,
}

impl Aggregator {
    /// Build an aggregator over `services`.
    ///
    /// Descriptors are ordered by their mask bit; the bits must cover
    /// positions `0..N` exactly, which also rules out duplicates.
    pub fn new(
        assumed_honest: u64,
        mut services: Vec<ServiceDetails>,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let n = services.len();
        if n == 0 || n > MAX_COMMITTEE_SIZE {
            return Err(DasError::Config(format!(
                "committee must have between 1 and {} members, got {}",
                MAX_COMMITTEE_SIZE, n
            )));
        }
        if assumed_honest == 0 || assumed_honest > n as u64 {
            return Err(DasError::Config(format!(
                "assumed honest must be between 1 and {}, got {}",
                n, assumed_honest
            )));
        }

        services.sort_by_key(|s| s.signer_index());
        for (position, service) in services.iter().enumerate() {
            if service.signer_index() as usize != position {
                return Err(DasError::Config(format!(
                    "signer masks must cover keyset positions 0..{} exactly; {} is at position {}",
                    n, service, position
                )));
            }
        }

        let keyset = Keyset::new(
            assumed_honest,
            services.iter().map(|s| s.pub_key).collect(),
        );
        let keyset_bytes = keyset.serialize();
        let keyset_hash = keyset.hash();
        info!(
            "DAS aggregator configured with {} backends, assumed honest {}, keyset {}",
            n,
            assumed_honest,
            hash_to_hex(&keyset_hash)
        );

        Ok(Self {
            services,
            keyset,
            keyset_hash,
            keyset_bytes,
            request_timeout,
        })
    }

    /// Build the aggregator described by `config.aggregator`.
    pub fn from_config(config: &DataAvailabilityConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let services = setup_services(&config.aggregator.backends, timeout)?;
        Self::new(config.aggregator.assumed_honest, services, timeout)
    }

    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    pub fn keyset_hash(&self) -> &Hash32 {
        &self.keyset_hash
    }

    pub fn keyset_bytes(&self) -> &[u8] {
        &self.keyset_bytes
    }

    pub fn services(&self) -> &[ServiceDetails] {
        &self.services
    }

    pub fn assumed_honest(&self) -> u64 {
        self.keyset.assumed_honest
    }

    /// Health of every committee member, keyed by metric label.
    pub async fn backend_health(&self) -> Vec<(String, Result<()>)> {
        let mut tasks = JoinSet::new();
        for (i, details) in self.services.iter().enumerate() {
            let service = details.service.clone();
            tasks.spawn(async move { (i, service.health_check().await) });
        }
        let mut results: Vec<Option<Result<()>>> = self.services.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, result)) => results[i] = Some(result),
                Err(e) => warn!("health check task failed: {}", e),
            }
        }
        self.services
            .iter()
            .zip(results)
            .map(|(details, result)| {
                let result = result
                    .unwrap_or_else(|| Err(DasError::Transport("health check aborted".into())));
                (details.metric_label.clone(), result)
            })
            .collect()
    }

    /// Validate one member's response and return its partial signature.
    fn check_response(
        details: &ServiceDetails,
        cert: &DataAvailabilityCertificate,
        data_hash: &Hash32,
        timeout: u64,
    ) -> Result<Signature> {
        if cert.data_hash != *data_hash {
            return Err(DasError::InvalidHash {
                expected: hash_to_hex(data_hash),
            });
        }
        if cert.timeout != timeout {
            return Err(DasError::Encoding(format!(
                "signer returned timeout {}, requested {}",
                cert.timeout, timeout
            )));
        }
        let message = DataAvailabilityCertificate::signable_message(data_hash, timeout);
        if !bls::verify(&cert.sig, &message, &details.pub_key) {
            return Err(DasError::Crypto(format!(
                "partial signature from {} does not verify",
                details.metric_label
            )));
        }
        Ok(cert.sig)
    }

    async fn collect(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        let data_hash = content_hash(message);
        let message: Arc<[u8]> = Arc::from(message);
        let sig: Arc<[u8]> = Arc::from(sig);

        let mut tasks = JoinSet::new();
        for (i, details) in self.services.iter().enumerate() {
            let service = details.service.clone();
            let message = message.clone();
            let sig = sig.clone();
            tasks.spawn(async move { (i, service.store(&message, timeout, &sig).await) });
        }

        let required = self.keyset.assumed_honest as usize;
        let max_failures = self.services.len() - required;
        let mut signers_mask = 0u64;
        let mut partials = Vec::with_capacity(required);
        let mut failed = 0usize;

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((i, result)) => {
                    let details = &self.services[i];
                    match result.and_then(|cert| {
                        Self::check_response(details, &cert, &data_hash, timeout)
                    }) {
                        Ok(partial) => Some((details.signers_mask, partial)),
                        Err(e) => {
                            warn!(
                                "DAS backend {} failed store of {}: {}",
                                details.metric_label,
                                pretty_hash(&data_hash),
                                e
                            );
                            None
                        }
                    }
                }
                Err(e) => {
                    warn!("DAS store task failed: {}", e);
                    None
                }
            };

            match outcome {
                Some((mask, partial)) if signers_mask & mask == 0 => {
                    signers_mask |= mask;
                    partials.push(partial);
                    debug!(
                        "collected {} of {} signatures for {}",
                        partials.len(),
                        required,
                        pretty_hash(&data_hash)
                    );
                    if partials.len() >= required {
                        break;
                    }
                }
                Some(_) => {}
                None => {
                    failed += 1;
                    if failed > max_failures {
                        return Err(DasError::QuorumNotMet {
                            signed: partials.len(),
                            required,
                            failed,
                        });
                    }
                }
            }
        }
        // Late responses are not awaited.
        drop(tasks);

        if partials.len() < required {
            return Err(DasError::QuorumNotMet {
                signed: partials.len(),
                required,
                failed,
            });
        }

        let cert = DataAvailabilityCertificate {
            data_hash,
            timeout,
            signers_mask,
            sig: bls::aggregate(&partials)?,
            keyset_hash: self.keyset_hash,
            version: CERTIFICATE_VERSION,
        };
        cert.verify(&self.keyset)?;
        info!(
            "stored {} with {} signers (mask {:#x})",
            pretty_hash(&data_hash),
            partials.len(),
            signers_mask
        );
        Ok(cert)
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aggregator{{")?;
        for (i, details) in self.services.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", details)?;
        }
        write!(f, "}}")
    }
}

#[async_trait]
impl DataAvailabilityWriter for Aggregator {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.collect(message, timeout, sig))
                .await
                .map_err(|_| DasError::Timeout(limit))?,
            None => self.collect(message, timeout, sig).await,
        }
    }
}

//! Committee members bound to their signing keys and mask positions.

use crate::config::BackendConfig;
use das_client::DasRpcClient;
use das_schema::bls::{self, PublicKey};
use das_schema::{DasError, DataAvailabilityBackend, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A committee member: its client, BLS key and signer bit.
#[derive(Clone)]
pub struct ServiceDetails {
    pub service: Arc<dyn DataAvailabilityBackend>,
    pub pub_key: PublicKey,
    /// Exactly one bit set.
    pub signers_mask: u64,
    /// Host-derived label safe for metric names.
    pub metric_label: String,
}

impl ServiceDetails {
    pub fn new(
        service: Arc<dyn DataAvailabilityBackend>,
        pub_key: PublicKey,
        signers_mask: u64,
        metric_label: impl Into<String>,
    ) -> Result<Self> {
        if signers_mask.count_ones() != 1 {
            return Err(DasError::Config(format!(
                "tried to configure backend {} with invalid signers mask {:#x}",
                service, signers_mask
            )));
        }
        Ok(Self {
            service,
            pub_key,
            signers_mask,
            metric_label: metric_label.into(),
        })
    }

    /// Position of this signer in the keyset.
    pub fn signer_index(&self) -> u32 {
        self.signers_mask.trailing_zeros()
    }
}

impl fmt::Debug for ServiceDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDetails")
            .field("service", &self.service.to_string())
            .field("signers_mask", &self.signers_mask)
            .field("metric_label", &self.metric_label)
            .finish()
    }
}

impl fmt::Display for ServiceDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServiceDetails{{service:{}, signers_mask:{:#x}, label:{}}}",
            self.service, self.signers_mask, self.metric_label
        )
    }
}

/// Metric names must contain only `[a-zA-Z0-9:_]`; every run of other
/// characters becomes a single `_`.
pub fn sanitize_metric_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    let mut in_invalid_run = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == ':' || c == '_' {
            label.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            label.push('_');
            in_invalid_run = true;
        }
    }
    label
}

/// Metric label for a backend URL, derived from its host name.
pub fn metric_label_for_url(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| DasError::Config(format!("invalid backend url {}: {}", url, e)))?;
    let host = parsed.host_str().unwrap_or_default();
    Ok(sanitize_metric_label(host))
}

/// Resolve backend configuration records into service descriptors.
pub fn setup_services(
    backends: &[BackendConfig],
    request_timeout: Option<Duration>,
) -> Result<Vec<ServiceDetails>> {
    backends
        .iter()
        .map(|b| {
            let metric_label = metric_label_for_url(&b.url)?;
            let client = match request_timeout {
                Some(timeout) => DasRpcClient::with_timeout(&b.url, timeout)?,
                None => DasRpcClient::new(&b.url)?,
            };
            let pub_key = bls::decode_base64_public_key(&b.pubkey)?;
            debug!(backend = %metric_label, signers_mask = b.signermask, "configured DAS backend");
            ServiceDetails::new(Arc::new(client), pub_key, b.signermask, metric_label)
        })
        .collect()
}

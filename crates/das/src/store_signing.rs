//! Authorizes store requests with a secp256k1 signature.
//!
//! Committee members accept stores only from known batch posters. The
//! poster signs `keccak256(prefix || timeout || message)` and the member
//! recovers the signing address from the 65-byte `r || s || v` signature.

use async_trait::async_trait;
use das_schema::pretty::first_few_bytes;
use das_schema::{keccak256, DasError, DataAvailabilityCertificate, DataAvailabilityWriter, Hash32, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Domain separation prefix for store request signatures.
pub const STORE_REQUEST_PREFIX: &[u8] = b"Mantle DAS API Store:";

/// Length of a recoverable signature.
pub const SIGNATURE_LEN: usize = 65;

/// 20-byte account address.
pub type Address = [u8; 20];

/// Signs a 32-byte digest, returning `r || s || v`.
pub type DataSigner = Arc<dyn Fn(&Hash32) -> Result<Vec<u8>> + Send + Sync>;

/// Digest signed for a store of `data` with `timeout`.
pub fn das_store_hash(data: &[u8], timeout: u64) -> Hash32 {
    keccak256(&[STORE_REQUEST_PREFIX, &timeout.to_be_bytes(), data])
}

pub fn apply_das_signer(signer: &DataSigner, data: &[u8], timeout: u64) -> Result<Vec<u8>> {
    signer(&das_store_hash(data, timeout))
}

/// Address that produced `sig` over a store of `data` with `timeout`.
///
/// Accepts `v` as either 0/1 or 27/28.
pub fn das_recover_signer(data: &[u8], timeout: u64, sig: &[u8]) -> Result<Address> {
    if sig.len() != SIGNATURE_LEN {
        return Err(DasError::Crypto(format!(
            "store signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            sig.len()
        )));
    }
    let v = match sig[64] {
        v @ 27..=28 => v - 27,
        v => v,
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| DasError::Crypto(format!("invalid recovery id {}", sig[64])))?;
    let signature = Signature::from_slice(&sig[..64])
        .map_err(|e| DasError::Crypto(format!("invalid store signature: {}", e)))?;
    let key = VerifyingKey::recover_from_prehash(&das_store_hash(data, timeout), &signature, recovery_id)
        .map_err(|e| DasError::Crypto(format!("signer recovery failed: {}", e)))?;
    Ok(address_of(&key))
}

/// Last 20 bytes of the keccak256 of the uncompressed public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = k256::PublicKey::from(key).to_encoded_point(false);
    let hash = keccak256(&[&point.as_bytes()[1..]]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    addr
}

/// Parse a hex encoded (optionally `0x`-prefixed) secp256k1 private key.
pub fn signing_key_from_hex(key: &str) -> Result<SigningKey> {
    let bytes = hex::decode(key.trim().trim_start_matches("0x"))
        .map_err(|e| DasError::Config(format!("invalid signing key hex: {}", e)))?;
    SigningKey::from_slice(&bytes).map_err(|e| DasError::Config(format!("invalid signing key: {}", e)))
}

/// A [`DataSigner`] backed by a local private key.
pub fn signer_from_private_key(key: SigningKey) -> DataSigner {
    Arc::new(move |digest: &Hash32| {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(digest)
            .map_err(|e| DasError::Crypto(format!("signing failed: {}", e)))?;
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte());
        Ok(out)
    })
}

/// Signs every store before forwarding it to the inner writer.
pub struct StoreSigningDas {
    inner: Arc<dyn DataAvailabilityWriter>,
    signer: DataSigner,
    addr: Address,
}

impl StoreSigningDas {
    /// Wrap `inner`. The signer is exercised once to learn its address.
    pub fn new(inner: Arc<dyn DataAvailabilityWriter>, signer: DataSigner) -> Result<Self> {
        let sig = apply_das_signer(&signer, &[], 0)?;
        let addr = das_recover_signer(&[], 0, &sig)?;
        Ok(Self {
            inner,
            signer,
            addr,
        })
    }

    pub fn signer_address(&self) -> Address {
        self.addr
    }
}

impl fmt::Debug for StoreSigningDas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSigningDas")
            .field("addr", &hex::encode(self.addr))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for StoreSigningDas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreSigningDas(0x{}, {})",
            hex::encode(self.addr),
            self.inner
        )
    }
}

#[async_trait]
impl DataAvailabilityWriter for StoreSigningDas {
    async fn store(
        &self,
        message: &[u8],
        timeout: u64,
        sig: &[u8],
    ) -> Result<DataAvailabilityCertificate> {
        trace!(
            "StoreSigningDas store message {} timeout {} sig {}",
            first_few_bytes(message),
            timeout,
            first_few_bytes(sig)
        );
        let my_sig = apply_das_signer(&self.signer, message, timeout)?;
        self.inner.store(message, timeout, &my_sig).await
    }
}

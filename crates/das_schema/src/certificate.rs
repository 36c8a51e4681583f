//! Data-availability certificates.

use crate::bls::{self, Signature};
use crate::error::{DasError, Result};
use crate::keyset::{ByteReader, Keyset, MAX_KEYSET_SIZE};
use crate::Hash32;

/// Current certificate version.
pub const CERTIFICATE_VERSION: u8 = 1;

/// Set on the first byte of every serialized certificate.
pub const DAS_MESSAGE_HEADER_FLAG: u8 = 0x80;

/// Set when the data hash is a content hash of the full message (version 1).
pub const CONTENT_HASH_HEADER_FLAG: u8 = 0x08;

/// Prefix of the message committee members sign for a certificate.
pub const CERT_SIGNING_PREFIX: &[u8] = b"DAS Certificate:";

const SERIALIZED_LEN: usize = 1 + 32 + 32 + 8 + 8 + bls::SIGNATURE_LEN + 1;

/// Proof that a quorum of the committee attested to holding `data_hash`
/// until `timeout`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataAvailabilityCertificate {
    /// Content hash of the stored message.
    pub data_hash: Hash32,
    /// Unix seconds until which the data must be retrievable.
    pub timeout: u64,
    /// Bit `i` set iff keyset member `i` signed.
    pub signers_mask: u64,
    /// Aggregate of the signers' signatures over [`Self::signable_fields`].
    pub sig: Signature,
    /// Hash of the keyset the signers belong to.
    pub keyset_hash: Hash32,
    pub version: u8,
}

impl DataAvailabilityCertificate {
    /// The message every committee member signs for `(data_hash, timeout)`.
    pub fn signable_message(data_hash: &Hash32, timeout: u64) -> Vec<u8> {
        let mut msg = Vec::with_capacity(CERT_SIGNING_PREFIX.len() + 8 + 32);
        msg.extend_from_slice(CERT_SIGNING_PREFIX);
        msg.extend_from_slice(&timeout.to_be_bytes());
        msg.extend_from_slice(data_hash);
        msg
    }

    pub fn signable_fields(&self) -> Vec<u8> {
        Self::signable_message(&self.data_hash, self.timeout)
    }

    pub fn signer_count(&self) -> u32 {
        self.signers_mask.count_ones()
    }

    /// Check the quorum invariant against `keyset`.
    ///
    /// The certificate is valid iff it names this keyset, enough signers are
    /// set in the mask, and the aggregate signature verifies against exactly
    /// the keys at the mask positions.
    pub fn verify(&self, keyset: &Keyset) -> Result<()> {
        if keyset.len() > MAX_KEYSET_SIZE {
            return Err(DasError::Crypto(format!(
                "keyset of {} keys cannot be addressed by a signers mask",
                keyset.len()
            )));
        }
        if self.keyset_hash != keyset.hash() {
            return Err(DasError::Crypto("certificate keyset hash mismatch".into()));
        }
        if keyset.len() < 64 && self.signers_mask >> keyset.len() != 0 {
            return Err(DasError::Crypto(format!(
                "signers mask {:#x} names signers outside a keyset of {}",
                self.signers_mask,
                keyset.len()
            )));
        }
        if u64::from(self.signer_count()) < keyset.assumed_honest {
            return Err(DasError::Crypto(format!(
                "certificate has {} signers, keyset requires {}",
                self.signer_count(),
                keyset.assumed_honest
            )));
        }
        let signers: Vec<_> = keyset
            .pub_keys
            .iter()
            .enumerate()
            .filter(|(i, _)| self.signers_mask & (1u64 << i) != 0)
            .map(|(_, pk)| *pk)
            .collect();
        if !bls::verify_aggregate(&self.sig, &self.signable_fields(), &signers) {
            return Err(DasError::Crypto(
                "aggregate signature does not verify".into(),
            ));
        }
        Ok(())
    }

    /// Serialize for posting to the inbox.
    ///
    /// Format: `header || keyset_hash || data_hash || timeout (u64 BE) ||
    /// signers_mask (u64 BE) || sig || version`
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SERIALIZED_LEN);
        buf.push(DAS_MESSAGE_HEADER_FLAG | CONTENT_HASH_HEADER_FLAG);
        buf.extend_from_slice(&self.keyset_hash);
        buf.extend_from_slice(&self.data_hash);
        buf.extend_from_slice(&self.timeout.to_be_bytes());
        buf.extend_from_slice(&self.signers_mask.to_be_bytes());
        buf.extend_from_slice(&self.sig.to_bytes());
        buf.push(self.version);
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SERIALIZED_LEN {
            return Err(DasError::Encoding(format!(
                "certificate must be {} bytes, got {}",
                SERIALIZED_LEN,
                bytes.len()
            )));
        }
        let mut reader = ByteReader::new(bytes);
        let [header] = reader.take_array::<1>()?;
        if header & DAS_MESSAGE_HEADER_FLAG == 0 || header & CONTENT_HASH_HEADER_FLAG == 0 {
            return Err(DasError::Encoding(format!(
                "invalid certificate header {:#04x}",
                header
            )));
        }
        let keyset_hash = reader.take_array()?;
        let data_hash = reader.take_array()?;
        let timeout = u64::from_be_bytes(reader.take_array()?);
        let signers_mask = u64::from_be_bytes(reader.take_array()?);
        let sig = bls::signature_from_bytes(reader.take(bls::SIGNATURE_LEN)?)?;
        let [version] = reader.take_array::<1>()?;

        Ok(Self {
            data_hash,
            timeout,
            signers_mask,
            sig,
            keyset_hash,
            version,
        })
    }
}

//! Schema definitions for the data-availability committee client.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace:
//! - The certificate a committee quorum produces for a stored blob
//! - The keyset (committee public keys plus honesty threshold)
//! - Expiration policies reported by storage backends
//! - The capability traits implemented by clients, aggregators and decorators
//! - The error taxonomy surfaced to callers
//!
//! All byte encodings are deterministic so hashes and signatures can be
//! reproduced independently of the transport.

pub mod bls;
pub mod certificate;
pub mod error;
pub mod expiration;
pub mod keyset;
pub mod pretty;
pub mod traits;

use sha2::{Digest, Sha256};
use sha3::Keccak256;

pub use certificate::{DataAvailabilityCertificate, CERTIFICATE_VERSION};
pub use error::{DasError, ErrorKind, Result};
pub use expiration::ExpirationPolicy;
pub use keyset::Keyset;
pub use traits::{
    DataAvailabilityBackend, DataAvailabilityReader, DataAvailabilityService, DataAvailabilityStatus,
    DataAvailabilityWriter, StorageService,
};

/// A 32-byte hash value.
pub type Hash32 = [u8; 32];

/// Content hash of a blob. This is the key data is stored and retrieved under.
pub fn content_hash(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Check that `data` is the preimage of `hash`.
pub fn valid_hash(hash: &Hash32, data: &[u8]) -> bool {
    content_hash(data) == *hash
}

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Convert a hash to hex string.
pub fn hash_to_hex(hash: &Hash32) -> String {
    hex::encode(hash)
}

/// Parse a hex string (optionally `0x`-prefixed) to hash.
pub fn hex_to_hash(s: &str) -> std::result::Result<Hash32, hex::FromHexError> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    if bytes.len() != 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let h1 = content_hash(b"batch data");
        let h2 = content_hash(b"batch data");
        assert_eq!(h1, h2);
        assert_ne!(h1, content_hash(b"other data"));
    }

    #[test]
    fn test_valid_hash() {
        let data = b"some rollup batch".to_vec();
        let hash = content_hash(&data);
        assert!(valid_hash(&hash, &data));
        assert!(!valid_hash(&hash, b"tampered"));
    }

    #[test]
    fn test_hex_hash_roundtrip() {
        let hash = content_hash(b"abc");
        let hex = hash_to_hex(&hash);
        assert_eq!(hex_to_hash(&hex).unwrap(), hash);
        assert_eq!(hex_to_hash(&format!("0x{}", hex)).unwrap(), hash);
        assert!(hex_to_hash("abcd").is_err());
    }

    #[test]
    fn test_keccak_concatenation() {
        assert_eq!(keccak256(&[b"ab", b"c"]), keccak256(&[b"abc"]));
    }
}

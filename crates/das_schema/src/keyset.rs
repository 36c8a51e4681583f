//! Committee keysets.

use crate::bls::{self, PublicKey};
use crate::error::{DasError, Result};
use crate::{content_hash, Hash32};

/// Largest keyset a certificate can address; the signer mask is a `u64`.
pub const MAX_KEYSET_SIZE: usize = 64;

/// The committee public keys plus the number of signers that must be honest.
///
/// Key order matters: key `i` belongs to the signer at mask bit `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyset {
    /// Count of signers required to trust the quorum.
    pub assumed_honest: u64,
    /// Ordered BLS public keys.
    pub pub_keys: Vec<PublicKey>,
}

impl Keyset {
    pub fn new(assumed_honest: u64, pub_keys: Vec<PublicKey>) -> Self {
        Self {
            assumed_honest,
            pub_keys,
        }
    }

    /// Serialize the keyset.
    ///
    /// Only keysets of at most [`MAX_KEYSET_SIZE`] keys decode again.
    ///
    /// Format: `assumed_honest (u64 BE) || key_count (u16 BE) || (key_len (u16 BE) || key)*`
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.pub_keys.len() * (2 + bls::PUBLIC_KEY_LEN));
        buf.extend_from_slice(&self.assumed_honest.to_be_bytes());
        buf.extend_from_slice(&(self.pub_keys.len() as u16).to_be_bytes());
        for pk in &self.pub_keys {
            let bytes = pk.to_bytes();
            buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(&bytes);
        }
        buf
    }

    /// Decode a keyset produced by [`Keyset::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let assumed_honest = u64::from_be_bytes(reader.take_array()?);
        let count = u16::from_be_bytes(reader.take_array()?) as usize;
        if count > MAX_KEYSET_SIZE {
            return Err(DasError::Encoding(format!(
                "keyset of {} keys exceeds the maximum of {}",
                count, MAX_KEYSET_SIZE
            )));
        }

        let mut pub_keys = Vec::with_capacity(count);
        for _ in 0..count {
            let len = u16::from_be_bytes(reader.take_array()?) as usize;
            pub_keys.push(bls::public_key_from_bytes(reader.take(len)?)?);
        }
        if !reader.is_empty() {
            return Err(DasError::Encoding(
                "trailing bytes after keyset".to_string(),
            ));
        }
        Ok(Self {
            assumed_honest,
            pub_keys,
        })
    }

    /// Digest identifying this keyset.
    pub fn hash(&self) -> Hash32 {
        content_hash(&self.serialize())
    }

    pub fn len(&self) -> usize {
        self.pub_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pub_keys.is_empty()
    }
}

/// Cursor over a byte slice that fails instead of panicking on short input.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(DasError::Encoding(format!(
                "truncated input: need {} bytes, have {}",
                n,
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    pub(crate) fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

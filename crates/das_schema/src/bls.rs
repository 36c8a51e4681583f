//! BLS signing helpers over BLS12-381 (min-sig: signatures in G1, keys in G2).
//!
//! The curve arithmetic is provided by `blst`; this module only fixes the
//! ciphersuite and adapts its error codes to [`DasError`].

use crate::error::{DasError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blst::min_sig::AggregateSignature;
use blst::BLST_ERROR;
use rand::{rngs::OsRng, RngCore};

pub use blst::min_sig::{PublicKey, SecretKey, Signature};

/// Domain separation tag (proof-of-possession ciphersuite).
pub const DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";

/// Length of a compressed signature.
pub const SIGNATURE_LEN: usize = 48;

/// Length of a compressed public key.
pub const PUBLIC_KEY_LEN: usize = 96;

fn crypto_err(context: &str, err: BLST_ERROR) -> DasError {
    DasError::Crypto(format!("{}: {:?}", context, err))
}

/// Derive a key pair from 32 bytes of input keying material.
pub fn keys_from_ikm(ikm: &[u8; 32]) -> Result<(PublicKey, SecretKey)> {
    let sk = SecretKey::key_gen(ikm, &[]).map_err(|e| crypto_err("key generation", e))?;
    Ok((sk.sk_to_pk(), sk))
}

/// Generate a fresh random key pair.
pub fn generate_keys() -> Result<(PublicKey, SecretKey)> {
    let mut ikm = [0u8; 32];
    OsRng.fill_bytes(&mut ikm);
    keys_from_ikm(&ikm)
}

pub fn sign(sk: &SecretKey, message: &[u8]) -> Signature {
    sk.sign(message, DST, &[])
}

pub fn verify(sig: &Signature, message: &[u8], pk: &PublicKey) -> bool {
    sig.verify(true, message, DST, &[], pk, true) == BLST_ERROR::BLST_SUCCESS
}

/// Aggregate partial signatures over the same message.
pub fn aggregate(sigs: &[Signature]) -> Result<Signature> {
    if sigs.is_empty() {
        return Err(DasError::Crypto("no signatures to aggregate".to_string()));
    }
    let refs: Vec<&Signature> = sigs.iter().collect();
    AggregateSignature::aggregate(&refs, true)
        .map(|agg| agg.to_signature())
        .map_err(|e| crypto_err("signature aggregation", e))
}

/// Verify an aggregate signature where every signer signed `message`.
pub fn verify_aggregate(sig: &Signature, message: &[u8], pks: &[PublicKey]) -> bool {
    if pks.is_empty() {
        return false;
    }
    let refs: Vec<&PublicKey> = pks.iter().collect();
    sig.fast_aggregate_verify(true, message, DST, &refs) == BLST_ERROR::BLST_SUCCESS
}

/// Decode and validate a public key (compressed or uncompressed encoding).
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::key_validate(bytes).map_err(|e| crypto_err("invalid public key", e))
}

/// Decode a base64-encoded public key as found in committee configuration.
pub fn decode_base64_public_key(encoded: &str) -> Result<PublicKey> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| DasError::Encoding(format!("invalid base64 public key: {}", e)))?;
    public_key_from_bytes(&bytes)
}

pub fn encode_base64_public_key(pk: &PublicKey) -> String {
    BASE64.encode(pk.to_bytes())
}

pub fn signature_from_bytes(bytes: &[u8]) -> Result<Signature> {
    Signature::from_bytes(bytes).map_err(|e| crypto_err("invalid signature", e))
}

//! Short renderings of hashes and payloads for log lines.

use crate::Hash32;

/// First four bytes of a hash as hex, e.g. `a1b2c3d4..`.
pub fn pretty_hash(hash: &Hash32) -> String {
    format!("{}..", hex::encode(&hash[..4]))
}

/// First few bytes of a payload as hex, with the total length when truncated.
pub fn first_few_bytes(data: &[u8]) -> String {
    if data.len() <= 8 {
        hex::encode(data)
    } else {
        format!("{}..({} bytes)", hex::encode(&data[..8]), data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_few_bytes() {
        assert_eq!(first_few_bytes(&[1, 2]), "0102");
        assert_eq!(first_few_bytes(&[0u8; 20]), "0000000000000000..(20 bytes)");
        assert_eq!(pretty_hash(&[0xab; 32]), "abababab..");
    }
}

//! Serde adapters for `0x`-prefixed hex, the JSON-RPC convention for bytes
//! and quantities.

pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("hex string without 0x prefix"))?;
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

pub mod quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("hex quantity without 0x prefix"))?;
        u64::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
    }
}

/// Encode bytes as a `0x`-prefixed hex string.
pub fn encode_bytes(value: &[u8]) -> String {
    format!("0x{}", hex::encode(value))
}

/// Encode a quantity as a `0x`-prefixed hex string.
pub fn encode_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

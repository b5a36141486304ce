//! Hex encodings for hash fields in wire payloads.

use super::errors::Hash;
use serde::{Deserialize, Deserializer, Serializer};

fn decode_hash<E: serde::de::Error>(s: &str) -> Result<Hash, E> {
    let bytes = hex::decode(s).map_err(E::custom)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| E::custom(format!("expected 32-byte hash, got {} bytes", len)))
}

/// `Hash` as a lowercase hex string.
pub mod hash {
    use super::*;

    /// Serialize a hash as hex.
    pub fn serialize<S: Serializer>(hash: &Hash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(hash))
    }

    /// Deserialize a hash from hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(d)?;
        decode_hash(&s)
    }
}

/// `Vec<Hash>` as a list of hex strings.
pub mod hash_list {
    use super::*;

    /// Serialize hashes as a hex list.
    pub fn serialize<S: Serializer>(hashes: &[Hash], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(hashes.iter().map(hex::encode))
    }

    /// Deserialize hashes from a hex list.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Hash>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter().map(|s| decode_hash(s)).collect()
    }
}

/// `Option<Hash>` as hex or `null`.
pub mod hash_opt {
    use super::*;

    /// Serialize an optional hash.
    pub fn serialize<S: Serializer>(hash: &Option<Hash>, s: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(h) => s.serialize_some(&hex::encode(h)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an optional hash.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Hash>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => decode_hash(&s).map(Some),
            None => Ok(None),
        }
    }
}

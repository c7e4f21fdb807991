//! Fixed-size digests and the two derived index keys
//!
//! - `LocationHash`: SHA-256 over the big-endian bytes of (latitude, longitude).
//!   Fine-grained key for location buckets.
//! - `RegionHash`: SHA-256 over the UTF-8 location description. Coarse key for
//!   region aggregates.
//!
//! The two keys are independent: the same coordinates described two different
//! ways land in one location bucket but two regions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const DIGEST_LEN: usize = 32;

macro_rules! digest_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; DIGEST_LEN]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse 64 hex chars, with or without a `0x` prefix
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let mut bytes = [0u8; DIGEST_LEN];
                hex::decode_to_slice(digits, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

digest_type! {
    /// Fingerprint of the evidence (photo, audio, ...) backing an observation
    EvidenceHash
}

digest_type! {
    /// Key of a location bucket, derived from precise coordinates
    LocationHash
}

digest_type! {
    /// Key of a region aggregate, derived from the location description
    RegionHash
}

/// Bucket key for fixed-point coordinates (degrees scaled by 1e6)
pub fn location_hash(latitude: i64, longitude: i64) -> LocationHash {
    let mut hasher = Sha256::new();
    hasher.update(latitude.to_be_bytes());
    hasher.update(longitude.to_be_bytes());
    LocationHash(hasher.finalize().into())
}

/// Region key for a free-text location description
pub fn region_hash(location_description: &str) -> RegionHash {
    RegionHash(Sha256::digest(location_description.as_bytes()).into())
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length in bytes of every content hash in Arca.
pub const HASH_LEN: usize = 32;

fn decode_hash(s: &str) -> Result<[u8; HASH_LEN], TypeError> {
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != HASH_LEN {
        return Err(TypeError::InvalidLength {
            expected: HASH_LEN,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; HASH_LEN];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; HASH_LEN]);

        impl $name {
            /// Create from a pre-computed hash.
            pub const fn from_hash(hash: [u8; HASH_LEN]) -> Self {
                Self(hash)
            }

            /// The null identifier (all zeros). Represents "no content".
            pub const fn null() -> Self {
                Self([0u8; HASH_LEN])
            }

            /// Returns `true` if this is the null identifier.
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; HASH_LEN]
            }

            /// The raw 32-byte hash.
            pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
                &self.0
            }

            /// Hex-encoded string representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex representation (first 8 characters).
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                decode_hash(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($debug, "({})"), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; HASH_LEN]> for $name {
            fn from(bytes: [u8; HASH_LEN]) -> Self {
                Self(bytes)
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

hash_id!(
    /// Content-addressed identifier for an immutable blob.
    ///
    /// A `BlobId` is the BLAKE3 hash of a blob's bytes (see
    /// `arca_crypto::ContentHasher::BLOB`). Identical bytes always produce
    /// the same `BlobId`, so blob writes deduplicate and are idempotent.
    BlobId,
    "BlobId"
);

hash_id!(
    /// Logical alias for content within a namespace.
    ///
    /// A `ContentId` maps to one or more weighted [`BlobId`] candidates. It
    /// has the same shape as a blob hash; when no alias is registered a
    /// `ContentId` may name a blob directly.
    ContentId,
    "ContentId"
);

impl ContentId {
    /// Interpret this alias as a direct blob hash.
    pub fn as_blob_id(&self) -> BlobId {
        BlobId::from_hash(self.0)
    }
}

impl From<BlobId> for ContentId {
    fn from(id: BlobId) -> Self {
        Self(*id.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn null_is_all_zeros() {
        let null = BlobId::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn hex_roundtrip() {
        let id = BlobId::from_hash([7u8; 32]);
        let parsed = BlobId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = BlobId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            ContentId::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(BlobId::from_hash([1u8; 32]).short_hex().len(), 8);
    }

    #[test]
    fn debug_names_the_kind() {
        let blob = format!("{:?}", BlobId::from_hash([0xab; 32]));
        let cid = format!("{:?}", ContentId::from_hash([0xab; 32]));
        assert_eq!(blob, "BlobId(abababab)");
        assert_eq!(cid, "ContentId(abababab)");
    }

    #[test]
    fn serde_uses_hex_text() {
        let id = BlobId::from_hash([0x11; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let parsed: BlobId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn content_id_blob_id_share_bytes() {
        let blob = BlobId::from_hash([3u8; 32]);
        let cid = ContentId::from(blob);
        assert_eq!(cid.as_blob_id(), blob);
    }

    proptest! {
        #[test]
        fn display_parses_back(bytes in proptest::array::uniform32(any::<u8>())) {
            let id = BlobId::from_hash(bytes);
            let parsed: BlobId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}

use arca_types::BlobId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"arca-blob-v1"`) that is prepended
/// to every hash computation, so hashes from different domains over the same
/// bytes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob bytes. Every [`BlobId`] in the system comes from here.
    pub const BLOB: Self = Self {
        domain: "arca-blob-v1",
    };
    /// Hasher for deriving content ids from uncompressed content.
    pub const CONTENT: Self = Self {
        domain: "arca-content-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> BlobId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        BlobId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected identifier.
    pub fn verify(&self, data: &[u8], expected: &BlobId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        assert_ne!(ContentHasher::BLOB.hash(data), ContentHasher::CONTENT.hash(data));
    }

    #[test]
    fn verify_correct_and_tampered_data() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &id));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &id));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("test-domain-v1");
        assert_eq!(hasher.domain(), "test-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::BLOB.hash(b"data"));
    }

    #[test]
    fn empty_input_is_not_null() {
        assert!(!crate::blob_id(b"").is_null());
    }

    proptest! {
        #[test]
        fn blob_id_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(crate::blob_id(&data), crate::blob_id(&data));
        }

        #[test]
        fn content_id_differs_from_blob_id(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            let cid = crate::content_id(&data);
            prop_assert_ne!(cid.as_blob_id(), crate::blob_id(&data));
        }
    }
}

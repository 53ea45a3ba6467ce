//! Payload digesting
//!
//! SHA-1 over payload bytes, folded in as they stream past, rendered in
//! unpadded RFC 4648 base32 (32 characters for a SHA-1).

use data_encoding::BASE32_NOPAD;
use sha1::{Digest, Sha1};

/// Running digest of a record payload. Disabled digests cost nothing.
#[derive(Clone, Default)]
pub struct PayloadDigest {
    hasher: Option<Sha1>,
}

impl PayloadDigest {
    pub fn new(enabled: bool) -> Self {
        Self {
            hasher: enabled.then(Sha1::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.hasher.is_some()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(bytes);
        }
    }

    /// Finish and render the digest. Returns None when digesting was off.
    pub fn finish(&mut self) -> Option<String> {
        self.hasher
            .take()
            .map(|hasher| BASE32_NOPAD.encode(&hasher.finalize()))
    }
}

impl std::fmt::Debug for PayloadDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadDigest")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Base32 SHA-1 of a byte slice, as a reader would report it.
pub fn sha1_base32(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(&Sha1::digest(bytes))
}

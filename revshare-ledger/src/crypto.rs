//! Hashing helpers
//!
//! - SHA-256 content fingerprints for project registration
//! - SHA-256 block digests over the change sets committed in a block

use crate::{store::ChangeSet, types::ContentHash};
use sha2::{Digest, Sha256};

/// Fingerprint arbitrary content
pub fn content_digest(content: &[u8]) -> ContentHash {
    ContentHash::from_bytes(Sha256::digest(content).into())
}

/// Running digest of one block
///
/// Length-prefixes every key and value so that distinct change sets never
/// feed identical byte streams.
#[derive(Debug, Clone)]
pub struct BlockHasher {
    hasher: Sha256,
}

impl BlockHasher {
    /// Start a digest for the block at `height`
    pub fn new(height: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"revshare-block");
        hasher.update(height.to_be_bytes());
        Self { hasher }
    }

    /// Absorb one committed change set
    pub fn absorb(&mut self, changes: &ChangeSet) {
        self.hasher.update((changes.len() as u64).to_be_bytes());
        for (table, key, value) in changes.iter() {
            self.hasher.update(table.name().as_bytes());
            self.hasher.update((key.len() as u64).to_be_bytes());
            self.hasher.update(key);
            self.hasher.update((value.len() as u64).to_be_bytes());
            self.hasher.update(value);
        }
    }

    /// Final digest
    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

/// Lowercase hex encoding
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

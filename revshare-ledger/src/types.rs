//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (no floating point anywhere near money)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Project identifier (dense, starts at 1)
pub type ProjectId = u64;

/// Revenue / earnings amount in the ledger's smallest unit
pub type Amount = u128;

/// Block height assigned by the sequencer
pub type Height = u64;

/// Upper bound for the sum of share percentages on one project
pub const MAX_TOTAL_SHARE: u32 = 100;

/// Identity of a caller or collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Create new principal
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 32-byte content fingerprint (opaque to the ledger)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Length in bytes
    pub const LEN: usize = 32;

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ContentHash {
    type Error = crate::Error;

    fn try_from(bytes: &[u8]) -> crate::Result<Self> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::Error::InvalidContentHash(bytes.len()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Registered project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project ID
    pub id: ProjectId,

    /// Creator, immutable
    pub owner: Principal,

    /// Title (non-empty)
    pub title: String,

    /// Content fingerprint
    pub content_hash: ContentHash,

    /// License type (non-empty)
    pub license_type: String,

    /// Sum of every amount ever distributed
    pub total_revenue: Amount,

    /// Cleared by deactivation, never set again
    pub is_active: bool,

    /// Number of collaborator records
    pub collaborator_count: u32,

    /// Number of successful distributions
    pub distribution_count: u64,

    /// Height at creation
    pub created_at: Height,
}

/// Per-(project, collaborator) share record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorShare {
    /// Share of each distribution, 1..=100
    pub share_percentage: u32,

    /// Pending (not yet withdrawn) balance
    pub earnings: Amount,

    /// Free text
    pub role: String,

    /// Set by the collaborator acknowledging the record
    pub is_verified: bool,

    /// Height at which the record was added
    pub added_at: Height,

    /// Height of the last distribution that credited this record
    pub last_distribution: Height,
}

/// Who is calling, and at which height the call commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Caller identity
    pub caller: Principal,

    /// Commit sequence number
    pub height: Height,
}

impl CallContext {
    /// Create new call context
    pub fn new(caller: impl Into<Principal>, height: Height) -> Self {
        Self {
            caller: caller.into(),
            height,
        }
    }
}

/// Append-only record of a committed state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Dense sequence number (starts at 1)
    pub sequence: u64,

    /// UUIDv7 for external correlation
    pub event_id: Uuid,

    /// Block height of the committing operation
    pub height: Height,

    /// Caller of the committing operation
    pub caller: Principal,

    /// Wall clock at commit (informational only)
    pub recorded_at: DateTime<Utc>,

    /// Project the event belongs to
    pub project_id: ProjectId,

    /// What happened
    pub kind: EventKind,
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Project registered
    ProjectCreated,
    /// Project deactivated
    ProjectDeactivated,
    /// Share record added
    CollaboratorAdded {
        /// Collaborator identity
        collaborator: Principal,
        /// Share percentage
        share_percentage: u32,
    },
    /// Collaborator acknowledged their record
    CollaboratorVerified {
        /// Collaborator identity
        collaborator: Principal,
    },
    /// Revenue distributed
    RevenueDistributed {
        /// Nominal amount added to total revenue
        amount: Amount,
        /// Sum of truncated credits actually handed out
        credited: Amount,
    },
    /// Pending earnings withdrawn
    EarningsWithdrawn {
        /// Collaborator identity
        collaborator: Principal,
        /// Amount withdrawn
        amount: Amount,
    },
}

impl EventKind {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ProjectCreated => "project_created",
            EventKind::ProjectDeactivated => "project_deactivated",
            EventKind::CollaboratorAdded { .. } => "collaborator_added",
            EventKind::CollaboratorVerified { .. } => "collaborator_verified",
            EventKind::RevenueDistributed { .. } => "revenue_distributed",
            EventKind::EarningsWithdrawn { .. } => "earnings_withdrawn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_length() {
        let ok = ContentHash::try_from(&[7u8; 32][..]).unwrap();
        assert_eq!(ok.as_bytes(), &[7u8; 32]);

        let err = ContentHash::try_from(&[0u8; 31][..]).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidContentHash(31)));

        let err = ContentHash::try_from(&[0u8; 33][..]).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidContentHash(33)));
    }

    #[test]
    fn test_content_hash_display() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let hash = ContentHash::from_bytes(bytes);
        assert!(hash.to_string().starts_with("ab00"));
        assert_eq!(hash.to_string().len(), 64);
    }

    #[test]
    fn test_principal_ordering() {
        let a = Principal::new("ST1A");
        let b = Principal::new("ST1B");
        assert!(a < b);
        assert_eq!(a.to_string(), "ST1A");
    }
}

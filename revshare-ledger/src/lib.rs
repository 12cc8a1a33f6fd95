//! Revenue-sharing ledger
//!
//! Creators register content projects, assign percentage shares to
//! collaborators, distribute revenue across those shares and let each
//! collaborator withdraw what they have earned.
//!
//! # Architecture
//!
//! - **Injected store**: all state lives behind [`KvStore`] (RocksDB or memory)
//! - **Validate-then-apply**: writes are buffered and committed atomically
//! - **Single Writer**: the [`sequencer`] orders every mutation into blocks
//! - **Event log**: every committed change appends a [`LedgerEvent`]
//!
//! # Invariants
//!
//! - Σ share percentages per project never exceeds 100
//! - `total_revenue` equals the sum of all distributed amounts
//! - A rejected operation leaves the store unchanged

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod store;
pub mod state;
pub mod ids;
pub mod registry;
pub mod collaborators;
pub mod distribution;
pub mod withdrawal;
pub mod ledger;
pub mod sequencer;
pub mod crypto;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::{Committed, Ledger, Operation, Outcome};
pub use sequencer::{spawn_sequencer, BlockReceipt, SequencerHandle, Transaction};
pub use store::{ChangeSet, KvStore, MemoryStore, RocksStore, Table};
pub use types::{
    Amount, CallContext, CollaboratorShare, ContentHash, EventKind, Height, LedgerEvent,
    Principal, Project, ProjectId, MAX_TOTAL_SHARE,
};

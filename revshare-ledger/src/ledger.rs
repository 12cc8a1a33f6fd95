//! Main ledger orchestration layer
//!
//! Ties the store, the state transaction and the component modules into a
//! high-level API. Every mutating call runs validate-then-apply inside a
//! [`StateTx`] and either commits its whole change set or nothing.
//!
//! # Example
//!
//! ```
//! use revshare_ledger::{CallContext, Ledger, Principal};
//!
//! let ledger = Ledger::in_memory().unwrap();
//! let owner = CallContext::new("ST1OWNER", 0);
//!
//! let id = ledger.create_project(&owner, "Song", &[0u8; 32], "CC-BY").unwrap();
//! ledger
//!     .add_collaborator(&owner, id, &Principal::new("ST1BAND"), 50, "Guitar")
//!     .unwrap();
//! ledger.distribute_revenue(&owner, id, 1_000).unwrap();
//!
//! let band = CallContext::new("ST1BAND", 1);
//! assert_eq!(ledger.withdraw_earnings(&band, id).unwrap(), 500);
//! ```

use crate::{
    collaborators,
    config::Limits,
    distribution,
    error::{Error, Result},
    ids,
    metrics::Metrics,
    registry,
    state::{Snapshot, StateRead, StateTx},
    store::{ChangeSet, KvStore, MemoryStore, RocksStore, Table},
    types::{
        Amount, CallContext, CollaboratorShare, EventKind, Height, LedgerEvent, Principal,
        Project, ProjectId,
    },
    withdrawal, Config,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A mutating call, as submitted to the sequencer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Register a project
    CreateProject {
        /// Title
        title: String,
        /// Content fingerprint, must be 32 bytes
        content_hash: Vec<u8>,
        /// License type
        license_type: String,
    },
    /// Deactivate a project
    DeactivateProject {
        /// Project ID
        project_id: ProjectId,
    },
    /// Add a collaborator
    AddCollaborator {
        /// Project ID
        project_id: ProjectId,
        /// Collaborator identity
        collaborator: Principal,
        /// Share percentage
        share_percentage: u32,
        /// Role
        role: String,
    },
    /// Caller acknowledges their share record
    VerifyCollaborator {
        /// Project ID
        project_id: ProjectId,
    },
    /// Distribute revenue
    DistributeRevenue {
        /// Project ID
        project_id: ProjectId,
        /// Nominal amount
        amount: Amount,
    },
    /// Withdraw the caller's pending earnings
    WithdrawEarnings {
        /// Project ID
        project_id: ProjectId,
    },
}

impl Operation {
    /// Operation name, used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateProject { .. } => "create_project",
            Operation::DeactivateProject { .. } => "deactivate_project",
            Operation::AddCollaborator { .. } => "add_collaborator",
            Operation::VerifyCollaborator { .. } => "verify_collaborator",
            Operation::DistributeRevenue { .. } => "distribute_revenue",
            Operation::WithdrawEarnings { .. } => "withdraw_earnings",
        }
    }
}

/// Result of a successful operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// New project id
    ProjectCreated(ProjectId),
    /// Plain confirmation
    Confirmed,
    /// Amount withdrawn
    Withdrawn(Amount),
}

/// A committed operation with the writes it produced
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Operation result
    pub value: T,
    /// Writes applied to the store
    pub changes: ChangeSet,
    /// Events appended to the log
    pub events: Vec<LedgerEvent>,
}

fn dispatch<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    limits: &Limits,
    operation: &Operation,
) -> Result<Outcome> {
    match operation {
        Operation::CreateProject {
            title,
            content_hash,
            license_type,
        } => registry::create_project(tx, limits, title, content_hash, license_type)
            .map(Outcome::ProjectCreated),
        Operation::DeactivateProject { project_id } => {
            registry::deactivate_project(tx, *project_id).map(|_| Outcome::Confirmed)
        }
        Operation::AddCollaborator {
            project_id,
            collaborator,
            share_percentage,
            role,
        } => collaborators::add_collaborator(
            tx,
            limits,
            *project_id,
            collaborator,
            *share_percentage,
            role,
        )
        .map(|_| Outcome::Confirmed),
        Operation::VerifyCollaborator { project_id } => {
            collaborators::verify_collaborator(tx, *project_id).map(|_| Outcome::Confirmed)
        }
        Operation::DistributeRevenue { project_id, amount } => {
            distribution::distribute_revenue(tx, *project_id, *amount).map(|_| Outcome::Confirmed)
        }
        Operation::WithdrawEarnings { project_id } => {
            withdrawal::withdraw_earnings(tx, *project_id).map(Outcome::Withdrawn)
        }
    }
}

/// Main ledger interface
pub struct Ledger<S: ?Sized> {
    /// Input limits
    limits: Limits,

    /// Metrics
    metrics: Metrics,

    /// Serialises mutations from direct callers
    write_lock: Mutex<()>,

    /// State store
    store: Arc<S>,
}

impl<S: ?Sized> fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("limits", &self.limits)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Ledger<MemoryStore> {
    /// Ledger over a fresh in-memory store with default limits
    pub fn in_memory() -> Result<Self> {
        Ledger::new(Arc::new(MemoryStore::new()), Limits::default())
    }
}

impl Ledger<RocksStore> {
    /// Open the persistent ledger described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let store = RocksStore::open(config)?;
        Ledger::new(Arc::new(store), config.limits)
    }
}

impl<S: KvStore + ?Sized> Ledger<S> {
    /// Ledger over an injected store
    pub fn new(store: Arc<S>, limits: Limits) -> Result<Self> {
        Ok(Self {
            limits,
            metrics: Metrics::new()?,
            write_lock: Mutex::new(()),
            store,
        })
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Input limits in force
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn snapshot(&self) -> Snapshot<'_, S> {
        Snapshot::new(&*self.store)
    }

    /// Run one operation atomically
    fn run<T>(
        &self,
        operation: &'static str,
        ctx: &CallContext,
        op: impl FnOnce(&mut StateTx<'_, S>) -> Result<T>,
    ) -> Result<Committed<T>> {
        let _guard = self.write_lock.lock();

        let mut tx = StateTx::new(&*self.store, ctx.clone());
        let result = match op(&mut tx) {
            Ok(value) => {
                let (changes, events) = tx.finish();
                self.store.apply(&changes).map(|_| Committed {
                    value,
                    changes,
                    events,
                })
            }
            Err(err) => Err(err),
        };

        match &result {
            Ok(committed) => {
                self.metrics.record_operation(operation, "ok");
                for event in &committed.events {
                    match &event.kind {
                        EventKind::RevenueDistributed { amount, .. } => {
                            self.metrics.record_distribution(*amount)
                        }
                        EventKind::EarningsWithdrawn { amount, .. } => {
                            self.metrics.record_withdrawal(*amount)
                        }
                        _ => {}
                    }
                }
                tracing::info!(
                    operation,
                    caller = %ctx.caller,
                    height = ctx.height,
                    writes = committed.changes.len(),
                    events = committed.events.len(),
                    "Operation committed"
                );
            }
            Err(err) => {
                self.metrics.record_operation(operation, err.kind().as_str());
                tracing::warn!(
                    operation,
                    caller = %ctx.caller,
                    height = ctx.height,
                    code = err.code(),
                    error = %err,
                    "Operation rejected"
                );
            }
        }

        result
    }

    /// Execute a submitted operation
    pub fn execute(&self, ctx: &CallContext, operation: &Operation) -> Result<Committed<Outcome>> {
        let limits = &self.limits;
        self.run(operation.name(), ctx, |tx| dispatch(tx, limits, operation))
    }

    /// Execute an operation as part of the block at `ctx.height`
    ///
    /// The chain height is written in the operation's own change set, so a
    /// committed operation always leaves its block marked as sealed.
    pub fn execute_in_block(
        &self,
        ctx: &CallContext,
        operation: &Operation,
    ) -> Result<Committed<Outcome>> {
        let limits = &self.limits;
        self.run(operation.name(), ctx, |tx| {
            let outcome = dispatch(tx, limits, operation)?;
            tx.put_counter(ids::CHAIN_HEIGHT, tx.height())?;
            Ok(outcome)
        })
    }

    // Mutations

    /// Register a project owned by the caller
    pub fn create_project(
        &self,
        ctx: &CallContext,
        title: &str,
        content_hash: &[u8],
        license_type: &str,
    ) -> Result<ProjectId> {
        let limits = &self.limits;
        self.run("create_project", ctx, |tx| {
            registry::create_project(tx, limits, title, content_hash, license_type)
        })
        .map(|committed| committed.value)
    }

    /// Deactivate a project (owner only, one-way)
    pub fn deactivate_project(&self, ctx: &CallContext, project_id: ProjectId) -> Result<()> {
        self.run("deactivate_project", ctx, |tx| {
            registry::deactivate_project(tx, project_id)
        })
        .map(|committed| committed.value)
    }

    /// Add a collaborator (owner only)
    pub fn add_collaborator(
        &self,
        ctx: &CallContext,
        project_id: ProjectId,
        collaborator: &Principal,
        share_percentage: u32,
        role: &str,
    ) -> Result<()> {
        let limits = &self.limits;
        self.run("add_collaborator", ctx, |tx| {
            collaborators::add_collaborator(
                tx,
                limits,
                project_id,
                collaborator,
                share_percentage,
                role,
            )
        })
        .map(|committed| committed.value)
    }

    /// Caller acknowledges their own share record
    pub fn verify_collaborator(&self, ctx: &CallContext, project_id: ProjectId) -> Result<()> {
        self.run("verify_collaborator", ctx, |tx| {
            collaborators::verify_collaborator(tx, project_id)
        })
        .map(|committed| committed.value)
    }

    /// Distribute revenue to every collaborator (owner only)
    pub fn distribute_revenue(
        &self,
        ctx: &CallContext,
        project_id: ProjectId,
        amount: Amount,
    ) -> Result<()> {
        self.run("distribute_revenue", ctx, |tx| {
            distribution::distribute_revenue(tx, project_id, amount)
        })
        .map(|_| ())
    }

    /// Withdraw the caller's full pending balance
    pub fn withdraw_earnings(&self, ctx: &CallContext, project_id: ProjectId) -> Result<Amount> {
        self.run("withdraw_earnings", ctx, |tx| {
            withdrawal::withdraw_earnings(tx, project_id)
        })
        .map(|committed| committed.value)
    }

    // Queries (committed state only)

    /// Project record, if any
    pub fn get_project_details(&self, project_id: ProjectId) -> Result<Option<Project>> {
        registry::get_project_details(&self.snapshot(), project_id)
    }

    /// Share record, if any
    pub fn get_collaborator_info(
        &self,
        project_id: ProjectId,
        collaborator: &Principal,
    ) -> Result<Option<CollaboratorShare>> {
        collaborators::get_collaborator_info(&self.snapshot(), project_id, collaborator)
    }

    /// Pending balance, absent when there is no record
    pub fn get_pending_earnings(
        &self,
        project_id: ProjectId,
        collaborator: &Principal,
    ) -> Result<Option<Amount>> {
        collaborators::get_pending_earnings(&self.snapshot(), project_id, collaborator)
    }

    /// All share records of a project, ordered by principal
    pub fn list_collaborators(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<(Principal, CollaboratorShare)>> {
        collaborators::list_collaborators(&self.snapshot(), project_id)
    }

    /// Sum of allocated share percentages on a project
    pub fn allocated_share(&self, project_id: ProjectId) -> Result<u32> {
        collaborators::allocated_share(&self.snapshot(), project_id)
    }

    /// Number of projects ever created
    pub fn project_count(&self) -> Result<u64> {
        ids::project_count(&self.snapshot())
    }

    /// Up to `limit` events starting at sequence `from` (sequences start at 1)
    pub fn events_since(&self, from: u64, limit: usize) -> Result<Vec<LedgerEvent>> {
        let view = self.snapshot();
        let mut events = Vec::new();
        let mut sequence = from.max(1);
        while events.len() < limit {
            match view.event(sequence)? {
                Some(event) => events.push(event),
                None => break,
            }
            sequence += 1;
        }
        Ok(events)
    }

    // Chain height

    /// Height of the last sealed block, if any
    pub fn chain_height(&self) -> Result<Option<Height>> {
        self.snapshot()
            .read(Table::Meta, ids::CHAIN_HEIGHT)?
            .map(|bytes| bincode::deserialize(&bytes).map_err(Error::from))
            .transpose()
    }

    /// Persist `height` as the last sealed block
    pub fn seal_block(&self, height: Height) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut changes = ChangeSet::new();
        changes.put(
            Table::Meta,
            ids::CHAIN_HEIGHT.to_vec(),
            bincode::serialize(&height)?,
        );
        self.store.apply(&changes)?;

        self.metrics.record_block_sealed(height);
        tracing::debug!(height, "Block sealed");
        Ok(())
    }
}

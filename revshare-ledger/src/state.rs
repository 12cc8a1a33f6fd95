//! Typed state access and per-operation write buffering
//!
//! A [`StateTx`] reads through to the store, buffers every write and turns
//! into a single [`ChangeSet`] once the operation has passed all of its
//! preconditions. Dropping a `StateTx` discards its writes, which is how a
//! rejected operation leaves no trace.

use crate::{
    error::{Error, Result},
    ids,
    store::{ChangeSet, KvStore, Table},
    types::{
        CallContext, CollaboratorShare, EventKind, Height, LedgerEvent, Principal, Project,
        ProjectId,
    },
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// Key helpers

pub(crate) fn project_key(project_id: ProjectId) -> Vec<u8> {
    project_id.to_be_bytes().to_vec()
}

pub(crate) fn collaborator_key(project_id: ProjectId, collaborator: &Principal) -> Vec<u8> {
    let mut key = project_id.to_be_bytes().to_vec();
    key.extend_from_slice(collaborator.as_str().as_bytes());
    key
}

pub(crate) fn event_key(sequence: u64) -> Vec<u8> {
    sequence.to_be_bytes().to_vec()
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Read access to ledger state, committed or in-flight
pub trait StateRead {
    /// Raw point read
    fn read(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Raw prefix scan, in key order
    fn read_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Project record
    fn project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        self.read(Table::Projects, &project_key(project_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Share record for one (project, collaborator) pair
    fn share(
        &self,
        project_id: ProjectId,
        collaborator: &Principal,
    ) -> Result<Option<CollaboratorShare>> {
        self.read(Table::Collaborators, &collaborator_key(project_id, collaborator))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Every share record of a project, ordered by principal
    fn shares(&self, project_id: ProjectId) -> Result<Vec<(Principal, CollaboratorShare)>> {
        let prefix = project_key(project_id);
        self.read_prefix(Table::Collaborators, &prefix)?
            .into_iter()
            .map(|(key, value)| {
                let name = String::from_utf8(key[prefix.len()..].to_vec()).map_err(|_| {
                    Error::Storage(format!("Corrupt collaborator key on project {}", project_id))
                })?;
                Ok((Principal::new(name), decode(&value)?))
            })
            .collect()
    }

    /// Named counter, 0 when never written
    fn counter(&self, name: &[u8]) -> Result<u64> {
        Ok(self
            .read(Table::Meta, name)?
            .map(|bytes| decode(&bytes))
            .transpose()?
            .unwrap_or(0))
    }

    /// Event by sequence
    fn event(&self, sequence: u64) -> Result<Option<LedgerEvent>> {
        self.read(Table::Events, &event_key(sequence))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

/// Committed state only
#[derive(Debug)]
pub struct Snapshot<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: KvStore + ?Sized> Snapshot<'s, S> {
    /// Wrap a store
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }
}

impl<S: KvStore + ?Sized> StateRead for Snapshot<'_, S> {
    fn read(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.store.get(table, key)
    }

    fn read_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.store.scan_prefix(table, prefix)
    }
}

/// Write-buffering transaction for one operation
#[derive(Debug)]
pub struct StateTx<'s, S: ?Sized> {
    store: &'s S,
    ctx: CallContext,
    pending: BTreeMap<(Table, Vec<u8>), Vec<u8>>,
    changes: ChangeSet,
    events: Vec<LedgerEvent>,
}

impl<'s, S: KvStore + ?Sized> StateTx<'s, S> {
    /// Begin a transaction for `ctx`
    pub fn new(store: &'s S, ctx: CallContext) -> Self {
        Self {
            store,
            ctx,
            pending: BTreeMap::new(),
            changes: ChangeSet::new(),
            events: Vec::new(),
        }
    }

    /// Caller of this operation
    pub fn caller(&self) -> &Principal {
        &self.ctx.caller
    }

    /// Height this operation commits at
    pub fn height(&self) -> Height {
        self.ctx.height
    }

    fn write(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert((table, key.clone()), value.clone());
        self.changes.put(table, key, value);
    }

    /// Buffer a project write
    pub fn put_project(&mut self, project: &Project) -> Result<()> {
        let value = encode(project)?;
        self.write(Table::Projects, project_key(project.id), value);
        Ok(())
    }

    /// Buffer a share write
    pub fn put_share(
        &mut self,
        project_id: ProjectId,
        collaborator: &Principal,
        share: &CollaboratorShare,
    ) -> Result<()> {
        let value = encode(share)?;
        self.write(
            Table::Collaborators,
            collaborator_key(project_id, collaborator),
            value,
        );
        Ok(())
    }

    /// Buffer a counter write
    pub fn put_counter(&mut self, name: &[u8], value: u64) -> Result<()> {
        let value = encode(&value)?;
        self.write(Table::Meta, name.to_vec(), value);
        Ok(())
    }

    /// Append an event to the log
    pub fn emit(&mut self, project_id: ProjectId, kind: EventKind) -> Result<()> {
        let sequence = ids::next_event_sequence(self)?;
        let event = LedgerEvent {
            sequence,
            event_id: Uuid::now_v7(),
            height: self.ctx.height,
            caller: self.ctx.caller.clone(),
            recorded_at: Utc::now(),
            project_id,
            kind,
        };
        let value = encode(&event)?;
        self.write(Table::Events, event_key(sequence), value);
        self.events.push(event);
        Ok(())
    }

    /// Events emitted so far
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Finish: the buffered writes and emitted events
    pub fn finish(self) -> (ChangeSet, Vec<LedgerEvent>) {
        (self.changes, self.events)
    }
}

impl<S: KvStore + ?Sized> StateRead for StateTx<'_, S> {
    fn read(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.pending.get(&(table, key.to_vec())) {
            return Ok(Some(value.clone()));
        }
        self.store.get(table, key)
    }

    fn read_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.scan_prefix(table, prefix)?.into_iter().collect();

        let overlay = self
            .pending
            .range((table, prefix.to_vec())..)
            .take_while(|((t, key), _)| *t == table && key.starts_with(prefix));
        for ((_, key), value) in overlay {
            merged.insert(key.clone(), value.clone());
        }

        Ok(merged.into_iter().collect())
    }
}

//! Identifier allocation
//!
//! Counters live in the `meta` table and only move forward. An allocation
//! is part of the caller's change set, so an id handed to a rejected
//! operation is never observed and the sequence stays dense.

use crate::{
    error::{Error, Result},
    state::{StateRead, StateTx},
    store::KvStore,
    types::ProjectId,
};

/// Last issued project id
pub const PROJECT_ID_COUNTER: &[u8] = b"project_id";

/// Last issued event sequence
pub const EVENT_SEQUENCE_COUNTER: &[u8] = b"event_sequence";

/// Height of the last sealed block
pub const CHAIN_HEIGHT: &[u8] = b"chain_height";

fn bump<S: KvStore + ?Sized>(tx: &mut StateTx<'_, S>, name: &[u8]) -> Result<u64> {
    let next = tx.counter(name)?.checked_add(1).ok_or_else(|| {
        Error::Overflow(format!("counter {} exhausted", String::from_utf8_lossy(name)))
    })?;
    tx.put_counter(name, next)?;
    Ok(next)
}

/// Allocate the next project id (first is 1)
pub fn next_project_id<S: KvStore + ?Sized>(tx: &mut StateTx<'_, S>) -> Result<ProjectId> {
    bump(tx, PROJECT_ID_COUNTER)
}

/// Allocate the next event sequence (first is 1)
pub fn next_event_sequence<S: KvStore + ?Sized>(tx: &mut StateTx<'_, S>) -> Result<u64> {
    bump(tx, EVENT_SEQUENCE_COUNTER)
}

/// Number of projects ever created
pub fn project_count(view: &impl StateRead) -> Result<u64> {
    view.counter(PROJECT_ID_COUNTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Snapshot;
    use crate::store::MemoryStore;
    use crate::types::CallContext;

    #[test]
    fn test_ids_start_at_one_and_persist() {
        let store = MemoryStore::new();

        let mut tx = StateTx::new(&store, CallContext::new("a", 0));
        assert_eq!(next_project_id(&mut tx).unwrap(), 1);
        assert_eq!(next_project_id(&mut tx).unwrap(), 2);
        store.apply(&tx.finish().0).unwrap();

        let mut tx = StateTx::new(&store, CallContext::new("a", 1));
        assert_eq!(next_project_id(&mut tx).unwrap(), 3);
        assert_eq!(project_count(&Snapshot::new(&store)).unwrap(), 2);
    }

    #[test]
    fn test_discarded_allocation_is_reissued() {
        let store = MemoryStore::new();
        {
            let mut tx = StateTx::new(&store, CallContext::new("a", 0));
            assert_eq!(next_project_id(&mut tx).unwrap(), 1);
        }
        let mut tx = StateTx::new(&store, CallContext::new("a", 0));
        assert_eq!(next_project_id(&mut tx).unwrap(), 1);
    }

    #[test]
    fn test_counters_are_independent() {
        let store = MemoryStore::new();
        let mut tx = StateTx::new(&store, CallContext::new("a", 0));
        assert_eq!(next_event_sequence(&mut tx).unwrap(), 1);
        assert_eq!(next_project_id(&mut tx).unwrap(), 1);
        assert_eq!(next_event_sequence(&mut tx).unwrap(), 2);
    }
}

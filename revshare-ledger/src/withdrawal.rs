//! Earnings withdrawal
//!
//! A collaborator pulls their whole pending balance in one go. The transfer
//! is recorded as an `EarningsWithdrawn` event in the same change set that
//! zeroes the balance.

use crate::{
    error::{Error, Result},
    state::{StateRead, StateTx},
    store::KvStore,
    types::{Amount, EventKind, ProjectId},
};

/// Withdraw the caller's full pending balance on a project
pub fn withdraw_earnings<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    project_id: ProjectId,
) -> Result<Amount> {
    let collaborator = tx.caller().clone();
    let mut share = tx
        .share(project_id, &collaborator)?
        .ok_or_else(|| Error::CollaboratorNotFound {
            project_id,
            collaborator: collaborator.to_string(),
        })?;

    let amount = share.earnings;
    if amount == 0 {
        return Err(Error::NoPendingEarnings {
            project_id,
            collaborator: collaborator.to_string(),
        });
    }

    share.earnings = 0;
    tx.put_share(project_id, &collaborator, &share)?;
    tx.emit(
        project_id,
        EventKind::EarningsWithdrawn {
            collaborator,
            amount,
        },
    )?;

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::add_collaborator;
    use crate::config::Limits;
    use crate::distribution::distribute_revenue;
    use crate::error::ErrorKind;
    use crate::registry::{create_project, deactivate_project};
    use crate::state::Snapshot;
    use crate::store::MemoryStore;
    use crate::types::{CallContext, Principal};

    fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        let mut tx = StateTx::new(&store, CallContext::new("owner", 0));
        create_project(&mut tx, &Limits::default(), "Game", &[1u8; 32], "GPL").unwrap();
        add_collaborator(&mut tx, &Limits::default(), 1, &"dev".into(), 50, "Dev").unwrap();
        distribute_revenue(&mut tx, 1, 100).unwrap();
        store.apply(&tx.finish().0).unwrap();
        store
    }

    fn withdraw(store: &MemoryStore, caller: &str) -> Result<Amount> {
        let mut tx = StateTx::new(store, CallContext::new(caller, 5));
        let amount = withdraw_earnings(&mut tx, 1)?;
        store.apply(&tx.finish().0)?;
        Ok(amount)
    }

    #[test]
    fn test_withdraw_full_balance_once() {
        let store = setup();
        assert_eq!(withdraw(&store, "dev").unwrap(), 50);
        assert_eq!(
            Snapshot::new(&store)
                .share(1, &Principal::new("dev"))
                .unwrap()
                .unwrap()
                .earnings,
            0
        );

        let err = withdraw(&store, "dev").unwrap_err();
        assert!(matches!(err, Error::NoPendingEarnings { .. }));
        assert_eq!(err.kind(), ErrorKind::NoFunds);
    }

    #[test]
    fn test_withdraw_records_transfer() {
        let store = setup();
        let mut tx = StateTx::new(&store, CallContext::new("dev", 5));
        withdraw_earnings(&mut tx, 1).unwrap();

        let last = tx.events().last().unwrap();
        assert_eq!(
            last.kind,
            EventKind::EarningsWithdrawn {
                collaborator: Principal::new("dev"),
                amount: 50
            }
        );
    }

    #[test]
    fn test_only_own_balance() {
        let store = setup();
        // The owner holds no share record of their own
        let err = withdraw(&store, "owner").unwrap_err();
        assert!(matches!(err, Error::CollaboratorNotFound { .. }));

        let mut tx = StateTx::new(&store, CallContext::new("dev", 5));
        let err = withdraw_earnings(&mut tx, 42).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_withdraw_after_deactivation() {
        let store = setup();
        let mut tx = StateTx::new(&store, CallContext::new("owner", 3));
        deactivate_project(&mut tx, 1).unwrap();
        store.apply(&tx.finish().0).unwrap();

        // Already-earned revenue stays withdrawable
        assert_eq!(withdraw(&store, "dev").unwrap(), 50);
    }
}

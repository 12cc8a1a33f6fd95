//! Collaborator ledger
//!
//! One share record per (project, collaborator) pair. The sum of share
//! percentages on a project never exceeds [`MAX_TOTAL_SHARE`].

use crate::{
    config::Limits,
    error::{Error, Result},
    registry::{require_active, require_owner, require_project},
    state::{StateRead, StateTx},
    store::KvStore,
    types::{Amount, CollaboratorShare, EventKind, Principal, ProjectId, MAX_TOTAL_SHARE},
};

/// Sum of share percentages already allocated on a project
pub fn allocated_share(view: &impl StateRead, project_id: ProjectId) -> Result<u32> {
    Ok(view
        .shares(project_id)?
        .iter()
        .map(|(_, share)| share.share_percentage)
        .sum())
}

/// Add a collaborator to a project (owner only)
pub fn add_collaborator<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    limits: &Limits,
    project_id: ProjectId,
    collaborator: &Principal,
    share_percentage: u32,
    role: &str,
) -> Result<()> {
    let mut project = require_project(&*tx, project_id)?;
    require_active(&project)?;
    require_owner(&project, tx.caller())?;

    if !(1..=MAX_TOTAL_SHARE).contains(&share_percentage) {
        return Err(Error::InvalidSharePercentage(share_percentage));
    }
    let role_len = role.chars().count();
    if role_len > limits.max_role_len {
        return Err(Error::InvalidRole(format!(
            "{} characters exceeds limit of {}",
            role_len, limits.max_role_len
        )));
    }
    if tx.share(project_id, collaborator)?.is_some() {
        return Err(Error::CollaboratorAlreadyExists {
            project_id,
            collaborator: collaborator.to_string(),
        });
    }
    let allocated = allocated_share(&*tx, project_id)?;
    if allocated + share_percentage > MAX_TOTAL_SHARE {
        return Err(Error::ShareCapExceeded {
            project_id,
            allocated,
            requested: share_percentage,
        });
    }

    let share = CollaboratorShare {
        share_percentage,
        earnings: 0,
        role: role.to_string(),
        is_verified: false,
        added_at: tx.height(),
        last_distribution: tx.height(),
    };
    project.collaborator_count = project
        .collaborator_count
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(format!("collaborator count on project {}", project_id)))?;

    tx.put_share(project_id, collaborator, &share)?;
    tx.put_project(&project)?;
    tx.emit(
        project_id,
        EventKind::CollaboratorAdded {
            collaborator: collaborator.clone(),
            share_percentage,
        },
    )?;

    Ok(())
}

/// Caller acknowledges their own share record
pub fn verify_collaborator<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    project_id: ProjectId,
) -> Result<()> {
    let caller = tx.caller().clone();
    let mut share = tx
        .share(project_id, &caller)?
        .ok_or_else(|| Error::CollaboratorNotFound {
            project_id,
            collaborator: caller.to_string(),
        })?;
    if share.is_verified {
        return Err(Error::AlreadyVerified {
            project_id,
            collaborator: caller.to_string(),
        });
    }

    share.is_verified = true;
    tx.put_share(project_id, &caller, &share)?;
    tx.emit(
        project_id,
        EventKind::CollaboratorVerified { collaborator: caller },
    )?;

    Ok(())
}

/// Share record, if any
pub fn get_collaborator_info(
    view: &impl StateRead,
    project_id: ProjectId,
    collaborator: &Principal,
) -> Result<Option<CollaboratorShare>> {
    view.share(project_id, collaborator)
}

/// Pending balance, absent when there is no record
pub fn get_pending_earnings(
    view: &impl StateRead,
    project_id: ProjectId,
    collaborator: &Principal,
) -> Result<Option<Amount>> {
    Ok(view
        .share(project_id, collaborator)?
        .map(|share| share.earnings))
}

/// All share records of a project, ordered by principal
pub fn list_collaborators(
    view: &impl StateRead,
    project_id: ProjectId,
) -> Result<Vec<(Principal, CollaboratorShare)>> {
    view.shares(project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::{create_project, deactivate_project};
    use crate::state::Snapshot;
    use crate::store::MemoryStore;
    use crate::types::CallContext;

    fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        let mut tx = StateTx::new(&store, CallContext::new("owner", 0));
        create_project(&mut tx, &Limits::default(), "Album", &[0u8; 32], "CC-BY").unwrap();
        store.apply(&tx.finish().0).unwrap();
        store
    }

    fn add(store: &MemoryStore, caller: &str, who: &str, pct: u32) -> Result<()> {
        let mut tx = StateTx::new(store, CallContext::new(caller, 2));
        add_collaborator(
            &mut tx,
            &Limits::default(),
            1,
            &Principal::new(who),
            pct,
            "Developer",
        )?;
        store.apply(&tx.finish().0)
    }

    #[test]
    fn test_add_collaborator() {
        let store = setup();
        add(&store, "owner", "wallet_1", 20).unwrap();

        let view = Snapshot::new(&store);
        let info = get_collaborator_info(&view, 1, &Principal::new("wallet_1"))
            .unwrap()
            .unwrap();
        assert_eq!(info.share_percentage, 20);
        assert_eq!(info.earnings, 0);
        assert_eq!(info.role, "Developer");
        assert!(!info.is_verified);
        assert_eq!(info.added_at, 2);
        assert_eq!(info.last_distribution, 2);

        assert_eq!(view.project(1).unwrap().unwrap().collaborator_count, 1);
        assert_eq!(
            get_pending_earnings(&view, 1, &Principal::new("wallet_1")).unwrap(),
            Some(0)
        );
        assert_eq!(
            get_pending_earnings(&view, 1, &Principal::new("nobody")).unwrap(),
            None
        );
    }

    #[test]
    fn test_percentage_range() {
        let store = setup();
        let err = add(&store, "owner", "c", 150).unwrap_err();
        assert!(matches!(err, Error::InvalidSharePercentage(150)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = add(&store, "owner", "c", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidSharePercentage(0)));

        add(&store, "owner", "c", 100).unwrap();
    }

    #[test]
    fn test_share_cap() {
        let store = setup();
        add(&store, "owner", "a", 60).unwrap();
        add(&store, "owner", "b", 30).unwrap();

        let err = add(&store, "owner", "c", 11).unwrap_err();
        assert!(matches!(
            err,
            Error::ShareCapExceeded {
                allocated: 90,
                requested: 11,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        add(&store, "owner", "c", 10).unwrap();
        assert_eq!(allocated_share(&Snapshot::new(&store), 1).unwrap(), 100);
    }

    #[test]
    fn test_duplicate_collaborator() {
        let store = setup();
        add(&store, "owner", "a", 10).unwrap();
        let err = add(&store, "owner", "a", 10).unwrap_err();
        assert!(matches!(err, Error::CollaboratorAlreadyExists { .. }));
        assert_eq!(
            Snapshot::new(&store).project(1).unwrap().unwrap().collaborator_count,
            1
        );
    }

    #[test]
    fn test_owner_and_state_checks() {
        let store = setup();
        let err = add(&store, "stranger", "a", 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let mut tx = StateTx::new(&store, CallContext::new("owner", 3));
        let err = add_collaborator(&mut tx, &Limits::default(), 2, &"a".into(), 10, "").unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound(2)));

        deactivate_project(&mut tx, 1).unwrap();
        store.apply(&tx.finish().0).unwrap();

        let err = add(&store, "owner", "a", 10).unwrap_err();
        assert!(matches!(err, Error::ProjectInactive(1)));
    }

    #[test]
    fn test_role_limit() {
        let store = setup();
        let mut tx = StateTx::new(&store, CallContext::new("owner", 1));
        let role = "r".repeat(65);
        let err = add_collaborator(&mut tx, &Limits::default(), 1, &"a".into(), 5, &role)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRole(_)));

        // Empty role is fine
        add_collaborator(&mut tx, &Limits::default(), 1, &"a".into(), 5, "").unwrap();
    }

    #[test]
    fn test_verify_collaborator() {
        let store = setup();
        add(&store, "owner", "wallet_1", 20).unwrap();

        let mut tx = StateTx::new(&store, CallContext::new("wallet_2", 3));
        let err = verify_collaborator(&mut tx, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut tx = StateTx::new(&store, CallContext::new("wallet_1", 3));
        verify_collaborator(&mut tx, 1).unwrap();
        store.apply(&tx.finish().0).unwrap();

        let info = get_collaborator_info(&Snapshot::new(&store), 1, &"wallet_1".into())
            .unwrap()
            .unwrap();
        assert!(info.is_verified);
        assert_eq!(info.share_percentage, 20);

        let mut tx = StateTx::new(&store, CallContext::new("wallet_1", 4));
        let err = verify_collaborator(&mut tx, 1).unwrap_err();
        assert!(matches!(err, Error::AlreadyVerified { .. }));
    }

    #[test]
    fn test_list_collaborators_ordered() {
        let store = setup();
        add(&store, "owner", "zoe", 10).unwrap();
        add(&store, "owner", "adam", 10).unwrap();

        let names: Vec<_> = list_collaborators(&Snapshot::new(&store), 1)
            .unwrap()
            .into_iter()
            .map(|(who, _)| who.to_string())
            .collect();
        assert_eq!(names, vec!["adam", "zoe"]);
    }
}

//! Revenue distribution
//!
//! Each collaborator is credited `floor(amount * pct / 100)`. The residue
//! left by truncation is not carried forward; the project's total revenue
//! always grows by the full nominal amount.

use crate::{
    error::{Error, Result},
    registry::{require_active, require_owner, require_project},
    state::{StateRead, StateTx},
    store::KvStore,
    types::{Amount, EventKind, ProjectId, MAX_TOTAL_SHARE},
};

/// Credit owed to one collaborator for one distribution
pub fn credit_for(amount: Amount, share_percentage: u32) -> Result<Amount> {
    amount
        .checked_mul(Amount::from(share_percentage))
        .map(|scaled| scaled / Amount::from(MAX_TOTAL_SHARE))
        .ok_or_else(|| Error::Overflow(format!("{} * {}%", amount, share_percentage)))
}

/// Distribute `amount` across every collaborator of the project (owner only)
///
/// Returns the sum of the credits actually handed out.
pub fn distribute_revenue<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    project_id: ProjectId,
    amount: Amount,
) -> Result<Amount> {
    let mut project = require_project(&*tx, project_id)?;
    require_active(&project)?;
    require_owner(&project, tx.caller())?;
    if amount == 0 {
        return Err(Error::InvalidAmount(amount));
    }

    // Compute every new balance before buffering any write
    let height = tx.height();
    let mut credited: Amount = 0;
    let mut updates = Vec::new();
    for (collaborator, mut share) in tx.shares(project_id)? {
        let credit = credit_for(amount, share.share_percentage)?;
        share.earnings = share.earnings.checked_add(credit).ok_or_else(|| {
            Error::Overflow(format!("earnings of {} on project {}", collaborator, project_id))
        })?;
        share.last_distribution = height;
        credited += credit;
        updates.push((collaborator, share));
    }

    project.total_revenue = project
        .total_revenue
        .checked_add(amount)
        .ok_or_else(|| Error::Overflow(format!("total revenue of project {}", project_id)))?;
    project.distribution_count = project
        .distribution_count
        .checked_add(1)
        .ok_or_else(|| Error::Overflow(format!("distribution count of project {}", project_id)))?;

    for (collaborator, share) in &updates {
        tx.put_share(project_id, collaborator, share)?;
    }
    tx.put_project(&project)?;
    tx.emit(project_id, EventKind::RevenueDistributed { amount, credited })?;

    tracing::debug!(
        project_id,
        amount = %amount,
        credited = %credited,
        collaborators = updates.len(),
        "Revenue distributed"
    );

    Ok(credited)
}

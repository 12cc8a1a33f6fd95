//! Project registry
//!
//! Owns project records: registration, one-way deactivation and the
//! existence / ownership / activity checks every other component runs
//! before touching a project.

use crate::{
    config::Limits,
    error::{Error, Result},
    ids,
    state::{StateRead, StateTx},
    store::KvStore,
    types::{ContentHash, EventKind, Principal, Project, ProjectId},
};

/// Load a project or fail with `ProjectNotFound`
pub(crate) fn require_project(view: &impl StateRead, project_id: ProjectId) -> Result<Project> {
    view.project(project_id)?
        .ok_or(Error::ProjectNotFound(project_id))
}

pub(crate) fn require_owner(project: &Project, caller: &Principal) -> Result<()> {
    if &project.owner != caller {
        return Err(Error::Unauthorized {
            project_id: project.id,
            caller: caller.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_active(project: &Project) -> Result<()> {
    if !project.is_active {
        return Err(Error::ProjectInactive(project.id));
    }
    Ok(())
}

fn validate_text(value: &str, max_len: usize) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(format!("{} characters exceeds limit of {}", len, max_len));
    }
    Ok(())
}

/// Register a new project owned by the caller
pub fn create_project<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    limits: &Limits,
    title: &str,
    content_hash: &[u8],
    license_type: &str,
) -> Result<ProjectId> {
    validate_text(title, limits.max_title_len).map_err(Error::InvalidTitle)?;
    let content_hash = ContentHash::try_from(content_hash)?;
    validate_text(license_type, limits.max_license_len).map_err(Error::InvalidLicense)?;

    let id = ids::next_project_id(tx)?;
    let project = Project {
        id,
        owner: tx.caller().clone(),
        title: title.to_string(),
        content_hash,
        license_type: license_type.to_string(),
        total_revenue: 0,
        is_active: true,
        collaborator_count: 0,
        distribution_count: 0,
        created_at: tx.height(),
    };

    tx.put_project(&project)?;
    tx.emit(id, EventKind::ProjectCreated)?;

    Ok(id)
}

/// Deactivate a project; there is no way back
pub fn deactivate_project<S: KvStore + ?Sized>(
    tx: &mut StateTx<'_, S>,
    project_id: ProjectId,
) -> Result<()> {
    let mut project = require_project(&*tx, project_id)?;
    require_owner(&project, tx.caller())?;
    if !project.is_active {
        return Err(Error::AlreadyInactive(project_id));
    }

    project.is_active = false;
    tx.put_project(&project)?;
    tx.emit(project_id, EventKind::ProjectDeactivated)?;

    Ok(())
}

/// Project record, if any
pub fn get_project_details(
    view: &impl StateRead,
    project_id: ProjectId,
) -> Result<Option<Project>> {
    view.project(project_id)
}

//! Interface to the external permission service. It gates calls into the
//! engine and never takes part in the engine's invariants.

use std::fmt;

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateIssue,
    UpdateIssue,
    MoveIssue,
    DeleteIssue,
    ManageColumns,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::CreateIssue => "create issues",
            Action::UpdateIssue => "update issues",
            Action::MoveIssue => "move issues",
            Action::DeleteIssue => "delete issues",
            Action::ManageColumns => "manage columns",
        })
    }
}

pub trait PermissionService: Send + Sync {
    fn can_mutate(&self, user_id: &str, project_id: &str, action: Action) -> bool;
}

/// Grants everything; used when no permission service is wired in.
pub struct AllowAll;

impl PermissionService for AllowAll {
    fn can_mutate(&self, _user_id: &str, _project_id: &str, _action: Action) -> bool {
        true
    }
}

/// Short-circuits with `Forbidden` before the engine runs.
pub fn authorize(
    permissions: &dyn PermissionService,
    user_id: &str,
    project_id: &str,
    action: Action,
) -> Result<(), EngineError> {
    if permissions.can_mutate(user_id, project_id, action) {
        Ok(())
    } else {
        tracing::info!(user_id, project_id, %action, "permission denied");
        Err(EngineError::Forbidden {
            action,
            project_id: project_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    impl PermissionService for ReadOnly {
        fn can_mutate(&self, _user_id: &str, _project_id: &str, _action: Action) -> bool {
            false
        }
    }

    #[test]
    fn denied_action_is_forbidden() {
        let err = authorize(&ReadOnly, "u1", "p1", Action::MoveIssue).unwrap_err();
        assert_eq!(err.to_string(), "not allowed to move issues in project p1");
        assert!(authorize(&AllowAll, "u1", "p1", Action::MoveIssue).is_ok());
    }
}

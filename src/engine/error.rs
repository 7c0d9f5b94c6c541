use std::fmt;

use thiserror::Error;

use crate::permissions::Action;

pub type EngineResult<T> = Result<T, EngineError>;

/// Referenced entity kinds, used to say which lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Project,
    Column,
    Issue,
    Parent,
    Epic,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Project => "project",
            Entity::Column => "column",
            Entity::Issue => "issue",
            Entity::Parent => "parent",
            Entity::Epic => "epic",
        })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("not allowed to {action} in project {project_id}")]
    Forbidden { action: Action, project_id: String },

    #[error("{0}")]
    Validation(#[from] ValidationReason),

    #[error("issue {issue_id} changed since version {expected}, refetch and retry")]
    Conflict { issue_id: String, expected: i32 },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Only a conflict is worth retrying unchanged, after a refetch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }
}

/// Why a write was rejected. `code()` is the stable snake_case name clients see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("an epic cannot have a parent issue or an epic")]
    EpicCannotHaveParent,
    #[error("subtasks cannot be nested below another subtask")]
    SubtaskNestingNotAllowed,
    #[error("epic_id must reference an issue of type epic")]
    EpicIdMustReferenceEpic,
    #[error("referenced issue belongs to another project")]
    CrossProjectReference,
    #[error("column belongs to another project")]
    ColumnProjectMismatch,
    #[error("a subtask needs a parent issue")]
    SubtaskRequiresParent,
    #[error("only subtasks can have a parent issue")]
    ParentRequiresSubtask,
    #[error("an issue cannot reference itself")]
    SelfReference,
    #[error("epic still groups other issues and cannot change type")]
    EpicStillReferenced,
    #[error("status {status} disagrees with the target column mapping {mapping}")]
    StatusColumnMismatch { status: String, mapping: String },
    #[error("version must be a positive integer, got {0}")]
    InvalidVersion(i32),
    #[error("issue is not an epic")]
    NotAnEpic,
    #[error("subtasks cannot have subtasks")]
    NotAParent,
    #[error("project key {0:?} must be 2-10 uppercase letters or digits starting with a letter")]
    InvalidProjectKey(String),
    #[error("project key {0} is already taken")]
    DuplicateProjectKey(String),
    #[error("issue key {0:?} is not of the form PROJ-123")]
    InvalidIssueKey(String),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("unknown {field} {value:?}")]
    UnknownValue { field: &'static str, value: String },
    #[error("column order must list every column of the project exactly once")]
    ColumnOrderMismatch,
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

impl ValidationReason {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationReason::EpicCannotHaveParent => "epic_cannot_have_parent",
            ValidationReason::SubtaskNestingNotAllowed => "subtask_nesting_not_allowed",
            ValidationReason::EpicIdMustReferenceEpic => "epic_id_must_reference_epic",
            ValidationReason::CrossProjectReference => "cross_project_reference",
            ValidationReason::ColumnProjectMismatch => "column_project_mismatch",
            ValidationReason::SubtaskRequiresParent => "subtask_requires_parent",
            ValidationReason::ParentRequiresSubtask => "parent_requires_subtask",
            ValidationReason::SelfReference => "self_reference",
            ValidationReason::EpicStillReferenced => "epic_still_referenced",
            ValidationReason::StatusColumnMismatch { .. } => "status_column_mismatch",
            ValidationReason::InvalidVersion(_) => "invalid_version",
            ValidationReason::NotAnEpic => "not_an_epic",
            ValidationReason::NotAParent => "not_a_parent",
            ValidationReason::InvalidProjectKey(_) => "invalid_project_key",
            ValidationReason::DuplicateProjectKey(_) => "duplicate_project_key",
            ValidationReason::InvalidIssueKey(_) => "invalid_issue_key",
            ValidationReason::EmptyField(_) => "empty_field",
            ValidationReason::UnknownValue { .. } => "unknown_value",
            ValidationReason::ColumnOrderMismatch => "column_order_mismatch",
            ValidationReason::OutOfRange { .. } => "out_of_range",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_their_reason() {
        let err: EngineError = ValidationReason::ColumnProjectMismatch.into();
        match err {
            EngineError::Validation(reason) => {
                assert_eq!(reason.code(), "column_project_mismatch")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = EngineError::Conflict {
            issue_id: "a".into(),
            expected: 1,
        };
        assert!(conflict.is_conflict());
        assert!(!EngineError::not_found(Entity::Issue, "a").is_conflict());
        assert_eq!(
            EngineError::not_found(Entity::Epic, "e1").to_string(),
            "epic e1 not found"
        );
    }
}

//! Structural rules between epics, subtasks and ordinary issues.
//!
//! Validation is split in two: shape rules that need no lookups, then rules
//! over the referenced rows. The rows are read through the store's
//! `*_for_share` lookups inside the write transaction, so they cannot change
//! between the check and the commit. An update that reshapes an existing
//! issue first takes that issue's row for update, so a concurrent write that
//! is about to hang a child under it either finishes first and is counted, or
//! waits and then sees the new shape.

use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::model::{BoardColumn, ChildLink, Issue, IssueType};
use super::store::IssueStore;

/// The hierarchy-relevant shape of an issue about to be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    /// `None` for an issue that does not exist yet.
    pub id: Option<&'a str>,
    pub project_id: &'a str,
    pub issue_type: IssueType,
    /// Type before this write, for existing issues.
    pub previous_type: Option<IssueType>,
    pub parent_issue_id: Option<&'a str>,
    pub epic_id: Option<&'a str>,
    pub column_id: Option<&'a str>,
}

impl<'a> Candidate<'a> {
    /// Candidate for rewriting `current` into `next`.
    pub fn for_update(current: &'a Issue, next: &'a Issue) -> Self {
        Candidate {
            id: Some(current.id.as_str()),
            project_id: current.project_id.as_str(),
            issue_type: next.issue_type,
            previous_type: Some(current.issue_type),
            parent_issue_id: next.parent_issue_id.as_deref(),
            epic_id: next.epic_id.as_deref(),
            column_id: next.column_id.as_deref(),
        }
    }
}

/// Rows a candidate points at, plus what points at the candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    pub parent: Option<Issue>,
    pub epic: Option<Issue>,
    pub column: Option<BoardColumn>,
    pub own_subtasks: usize,
    pub own_members: usize,
}

pub struct HierarchyValidator;

impl HierarchyValidator {
    /// Checks the candidate and returns the rows it references.
    pub fn validate<S: IssueStore>(
        store: &S,
        candidate: &Candidate<'_>,
    ) -> EngineResult<References> {
        Self::check_shape(candidate)?;
        let references = Self::load(store, candidate)?;
        Self::check_references(candidate, &references)?;
        Ok(references)
    }

    pub fn check_shape(candidate: &Candidate<'_>) -> Result<(), ValidationReason> {
        let has_parent = candidate.parent_issue_id.is_some();
        match candidate.issue_type {
            IssueType::Epic if has_parent || candidate.epic_id.is_some() => {
                return Err(ValidationReason::EpicCannotHaveParent)
            }
            IssueType::Subtask if !has_parent => {
                return Err(ValidationReason::SubtaskRequiresParent)
            }
            IssueType::Subtask => {}
            _ if has_parent => return Err(ValidationReason::ParentRequiresSubtask),
            _ => {}
        }

        if let Some(id) = candidate.id {
            if candidate.parent_issue_id == Some(id) || candidate.epic_id == Some(id) {
                return Err(ValidationReason::SelfReference);
            }
        }
        Ok(())
    }

    pub fn check_references(
        candidate: &Candidate<'_>,
        references: &References,
    ) -> Result<(), ValidationReason> {
        if let Some(parent) = &references.parent {
            if parent.project_id != candidate.project_id {
                return Err(ValidationReason::CrossProjectReference);
            }
            if parent.issue_type == IssueType::Subtask || parent.parent_issue_id.is_some() {
                return Err(ValidationReason::SubtaskNestingNotAllowed);
            }
        }
        if candidate.parent_issue_id.is_some() && references.own_subtasks > 0 {
            return Err(ValidationReason::SubtaskNestingNotAllowed);
        }

        if let Some(epic) = &references.epic {
            if epic.project_id != candidate.project_id {
                return Err(ValidationReason::CrossProjectReference);
            }
            if epic.issue_type != IssueType::Epic {
                return Err(ValidationReason::EpicIdMustReferenceEpic);
            }
        }

        if let Some(column) = &references.column {
            Self::check_column(candidate.project_id, column)?;
        }

        if candidate.previous_type == Some(IssueType::Epic)
            && candidate.issue_type != IssueType::Epic
            && references.own_members > 0
        {
            return Err(ValidationReason::EpicStillReferenced);
        }
        Ok(())
    }

    pub fn check_column(project_id: &str, column: &BoardColumn) -> Result<(), ValidationReason> {
        if column.project_id != project_id {
            return Err(ValidationReason::ColumnProjectMismatch);
        }
        Ok(())
    }

    fn load<S: IssueStore>(store: &S, candidate: &Candidate<'_>) -> EngineResult<References> {
        let mut references = References::default();

        if let Some(parent_id) = candidate.parent_issue_id {
            references.parent = Some(
                store
                    .find_issue_for_share(parent_id)?
                    .ok_or_else(|| EngineError::not_found(Entity::Parent, parent_id))?,
            );
        }
        if let Some(epic_id) = candidate.epic_id {
            references.epic = Some(
                store
                    .find_issue_for_share(epic_id)?
                    .ok_or_else(|| EngineError::not_found(Entity::Epic, epic_id))?,
            );
        }
        if let Some(column_id) = candidate.column_id {
            references.column = Some(
                store
                    .find_column_for_share(column_id)?
                    .ok_or_else(|| EngineError::not_found(Entity::Column, column_id))?,
            );
        }

        if let Some(id) = candidate.id {
            if candidate.parent_issue_id.is_some() {
                references.own_subtasks = store.child_statuses(ChildLink::Parent(id))?.len();
            }
            if candidate.previous_type == Some(IssueType::Epic)
                && candidate.issue_type != IssueType::Epic
            {
                references.own_members = store.child_statuses(ChildLink::Epic(id))?.len();
            }
        }
        Ok(references)
    }
}

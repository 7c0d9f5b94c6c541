use std::sync::Arc;

use uuid::Uuid;

use super::board::BoardConsistency;
use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::hierarchy::{Candidate, HierarchyValidator};
use super::model::{
    Issue, IssueChanges, IssueFilter, IssueStatus, IssueType, NewIssue, Priority,
};
use super::progress::{Progress, ProgressAggregator};
use super::sequence::{IssueKey, SequenceAllocator};
use super::store::IssueStore;
use super::transition::{Transition, TransitionKind, TransitionSink};
use super::version::VersionGuard;

const MAX_SEARCH_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIssueCommand {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub issue_type: IssueType,
    pub status: Option<IssueStatus>,
    pub column_id: Option<String>,
    pub parent_issue_id: Option<String>,
    pub epic_id: Option<String>,
    pub assignee_id: Option<String>,
    pub milestone_id: Option<String>,
}

impl CreateIssueCommand {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>, issue_type: IssueType) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            description: String::new(),
            priority: None,
            issue_type,
            status: None,
            column_id: None,
            parent_issue_id: None,
            epic_id: None,
            assignee_id: None,
            milestone_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateIssueCommand {
    pub issue_id: String,
    pub version: i32,
    pub changes: IssueChanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIssueCommand {
    pub issue_id: String,
    pub column_id: String,
    pub version: i32,
}

/// Entry point for every issue read and write.
///
/// Holds no mutable state: all coordination between concurrent callers goes
/// through the store's transactions and the version guard.
pub struct IssueEngine {
    sink: Arc<dyn TransitionSink>,
}

impl IssueEngine {
    pub fn new(sink: Arc<dyn TransitionSink>) -> Self {
        Self { sink }
    }

    pub fn create_issue<S: IssueStore>(
        &self,
        store: &S,
        actor_id: &str,
        command: CreateIssueCommand,
    ) -> EngineResult<Issue> {
        if command.title.trim().is_empty() {
            return Err(ValidationReason::EmptyField("title").into());
        }

        let issue = store.transaction(|tx| {
            let project = tx
                .find_project(&command.project_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Project, &command.project_id))?;

            let candidate = Candidate {
                id: None,
                project_id: &project.id,
                issue_type: command.issue_type,
                previous_type: None,
                parent_issue_id: command.parent_issue_id.as_deref(),
                epic_id: command.epic_id.as_deref(),
                column_id: command.column_id.as_deref(),
            };
            let references = HierarchyValidator::validate(tx, &candidate)?;
            let status = BoardConsistency::status_on_entry(command.status, references.column.as_ref())?
                .unwrap_or(IssueStatus::Open);

            let issue_number = SequenceAllocator::allocate(tx, &project.id)?;
            tx.insert_issue(&NewIssue {
                id: Uuid::new_v4().to_string(),
                project_id: project.id.clone(),
                issue_number,
                title: command.title.clone(),
                description: command.description.clone(),
                priority: command.priority.unwrap_or_default(),
                issue_type: command.issue_type,
                status,
                column_id: command.column_id.clone(),
                parent_issue_id: command.parent_issue_id.clone(),
                epic_id: command.epic_id.clone(),
                assignee_id: command.assignee_id.clone(),
                reporter_id: actor_id.to_string(),
                milestone_id: command.milestone_id.clone(),
            })
        })?;

        tracing::info!(
            issue_id = %issue.id,
            project_id = %issue.project_id,
            issue_number = issue.issue_number,
            issue_type = %issue.issue_type,
            "issue created"
        );
        Ok(issue)
    }

    pub fn update_issue<S: IssueStore>(
        &self,
        store: &S,
        actor_id: &str,
        command: UpdateIssueCommand,
    ) -> EngineResult<Issue> {
        VersionGuard::check_token(command.version)?;
        if matches!(&command.changes.title, Some(title) if title.trim().is_empty()) {
            return Err(ValidationReason::EmptyField("title").into());
        }

        let (before, after) = store.transaction(|tx| {
            let lookup = if command.changes.touches_hierarchy() {
                tx.find_issue_for_update(&command.issue_id)?
            } else {
                tx.find_issue(&command.issue_id)?
            };
            let current =
                lookup.ok_or_else(|| EngineError::not_found(Entity::Issue, &command.issue_id))?;

            let mut changes = command.changes.clone();
            let mut target_column = None;
            if changes.touches_hierarchy() {
                let next = changes.apply_to(&current);
                let references =
                    HierarchyValidator::validate(tx, &Candidate::for_update(&current, &next))?;
                target_column = references.column;
            }
            BoardConsistency::reconcile_update(tx, &current, &mut changes, target_column.as_ref())?;

            let updated = VersionGuard::write(tx, &current.id, command.version, &changes)?;
            Ok((current, updated))
        })?;

        tracing::info!(issue_id = %after.id, version = after.version, "issue updated");
        self.emit(&before, &after, actor_id, TransitionKind::Update);
        Ok(after)
    }

    /// Places the issue in a column, applying the column's status mapping in
    /// the same guarded write.
    pub fn move_issue<S: IssueStore>(
        &self,
        store: &S,
        actor_id: &str,
        command: MoveIssueCommand,
    ) -> EngineResult<Issue> {
        VersionGuard::check_token(command.version)?;

        let (before, after) = store.transaction(|tx| {
            let current = tx
                .find_issue(&command.issue_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Issue, &command.issue_id))?;
            let column = tx
                .find_column_for_share(&command.column_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Column, &command.column_id))?;
            HierarchyValidator::check_column(&current.project_id, &column)?;

            let changes = BoardConsistency::plan_move(&column);
            let updated = VersionGuard::write(tx, &current.id, command.version, &changes)?;
            Ok((current, updated))
        })?;

        tracing::info!(
            issue_id = %after.id,
            column_id = ?after.column_id,
            status = %after.status,
            version = after.version,
            "issue moved"
        );
        self.emit(&before, &after, actor_id, TransitionKind::Move);
        Ok(after)
    }

    /// Last write wins; takes the issue's subtasks with it and ungroups the
    /// members of a deleted epic.
    pub fn delete_issue<S: IssueStore>(&self, store: &S, issue_id: &str) -> EngineResult<Issue> {
        let deleted = store.transaction(|tx| {
            let current = tx
                .find_issue(issue_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Issue, issue_id))?;

            let subtasks = tx.search_issues(&IssueFilter {
                parent_issue_id: Some(current.id.clone()),
                ..IssueFilter::default()
            })?;
            for subtask in &subtasks {
                tx.delete_issue(&subtask.id)?;
            }
            if current.issue_type == IssueType::Epic {
                let detached = tx.detach_epic_members(&current.id)?;
                tracing::debug!(epic_id = %current.id, detached, "ungrouped epic members");
            }

            tx.delete_issue(&current.id)?
                .ok_or_else(|| EngineError::not_found(Entity::Issue, issue_id))
        })?;

        tracing::info!(issue_id = %deleted.id, "issue deleted");
        Ok(deleted)
    }

    pub fn get_issue<S: IssueStore>(&self, store: &S, issue_id: &str) -> EngineResult<Issue> {
        store
            .find_issue(issue_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Issue, issue_id))
    }

    pub fn get_issue_by_key<S: IssueStore>(&self, store: &S, key: &str) -> EngineResult<Issue> {
        let key: IssueKey = key.parse()?;
        let project = store
            .find_project_by_key(&key.project_key)?
            .ok_or_else(|| EngineError::not_found(Entity::Project, &key.project_key))?;
        store
            .find_issue_by_number(&project.id, key.issue_number)?
            .ok_or_else(|| EngineError::not_found(Entity::Issue, key.to_string()))
    }

    pub fn issue_key<S: IssueStore>(&self, store: &S, issue: &Issue) -> EngineResult<IssueKey> {
        let project = store
            .find_project(&issue.project_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Project, &issue.project_id))?;
        Ok(IssueKey::new(project.key, issue.issue_number))
    }

    pub fn search_issues<S: IssueStore>(
        &self,
        store: &S,
        filter: &IssueFilter,
    ) -> EngineResult<Vec<Issue>> {
        if let Some(limit) = filter.limit {
            if !(0..=MAX_SEARCH_LIMIT).contains(&limit) {
                return Err(ValidationReason::OutOfRange {
                    field: "limit",
                    value: limit,
                }
                .into());
            }
        }
        if let Some(offset) = filter.offset {
            if offset < 0 {
                return Err(ValidationReason::OutOfRange {
                    field: "offset",
                    value: offset,
                }
                .into());
            }
        }
        store.search_issues(filter)
    }

    pub fn epic_progress<S: IssueStore>(&self, store: &S, epic_id: &str) -> EngineResult<Progress> {
        ProgressAggregator::epic(store, epic_id)
    }

    pub fn subtask_progress<S: IssueStore>(
        &self,
        store: &S,
        issue_id: &str,
    ) -> EngineResult<Progress> {
        ProgressAggregator::subtasks(store, issue_id)
    }

    fn emit(&self, before: &Issue, after: &Issue, actor_id: &str, kind: TransitionKind) {
        self.sink.record_transition(&Transition {
            issue_id: after.id.clone(),
            project_id: after.project_id.clone(),
            old_state: before.board_state(),
            new_state: after.board_state(),
            actor_id: actor_id.to_string(),
            version: after.version,
            kind,
        });
    }
}

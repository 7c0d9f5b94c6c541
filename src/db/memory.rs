//! In-process store for local runs and tests. Transactions are serialized
//! behind one writer lock and roll back by restoring a snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::engine::model::{
    BoardColumn, ChildLink, ColumnChanges, Issue, IssueChanges, IssueFilter, IssueStatus,
    NewColumn, NewIssue, NewProject, Project,
};
use crate::engine::{EngineError, EngineResult, IssueStore, StoreProvider, ValidationReason};

#[derive(Debug, Clone)]
struct ProjectEntry {
    project: Project,
    issue_counter: i32,
}

#[derive(Debug, Clone, Default)]
struct State {
    projects: HashMap<String, ProjectEntry>,
    columns: HashMap<String, BoardColumn>,
    issues: HashMap<String, Issue>,
}

#[derive(Debug, Default)]
struct Inner {
    writer: Mutex<()>,
    state: Mutex<State>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl StoreProvider for MemoryStore {
    type Store = MemoryStore;

    fn checkout(&self) -> EngineResult<Self::Store> {
        Ok(self.clone())
    }
}

fn detach_where<P>(state: &mut State, now: DateTime<Utc>, linked: P, clear: fn(&mut Issue)) -> usize
where
    P: Fn(&Issue) -> bool,
{
    let mut detached = 0;
    for issue in state.issues.values_mut() {
        if !linked(issue) {
            continue;
        }
        clear(issue);
        issue.version += 1;
        issue.updated_at = now;
        detached += 1;
    }
    detached
}

impl IssueStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Self) -> EngineResult<T>,
    {
        let _writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.state().clone();
        let result = f(self);
        if result.is_err() {
            *self.state() = snapshot;
        }
        result
    }

    fn find_project(&self, project_id: &str) -> EngineResult<Option<Project>> {
        Ok(self
            .state()
            .projects
            .get(project_id)
            .map(|entry| entry.project.clone()))
    }

    fn find_project_by_key(&self, key: &str) -> EngineResult<Option<Project>> {
        Ok(self
            .state()
            .projects
            .values()
            .find(|entry| entry.project.key == key)
            .map(|entry| entry.project.clone()))
    }

    fn insert_project(&self, new_project: &NewProject) -> EngineResult<Project> {
        let mut state = self.state();
        if state
            .projects
            .values()
            .any(|entry| entry.project.key == new_project.key)
        {
            return Err(ValidationReason::DuplicateProjectKey(new_project.key.clone()).into());
        }
        if state.projects.contains_key(&new_project.id) {
            return Err(EngineError::Storage(format!(
                "project {} already exists",
                new_project.id
            )));
        }
        let project = Project {
            id: new_project.id.clone(),
            key: new_project.key.clone(),
            owner_id: new_project.owner_id.clone(),
            created_at: Utc::now(),
        };
        state.projects.insert(
            project.id.clone(),
            ProjectEntry {
                project: project.clone(),
                issue_counter: 0,
            },
        );
        Ok(project)
    }

    fn increment_issue_counter(&self, project_id: &str) -> EngineResult<Option<i32>> {
        Ok(self.state().projects.get_mut(project_id).map(|entry| {
            entry.issue_counter += 1;
            entry.issue_counter
        }))
    }

    fn find_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        Ok(self.state().columns.get(column_id).cloned())
    }

    fn find_column_for_share(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        self.find_column(column_id)
    }

    fn list_columns(&self, project_id: &str) -> EngineResult<Vec<BoardColumn>> {
        let mut columns: Vec<BoardColumn> = self
            .state()
            .columns
            .values()
            .filter(|column| column.project_id == project_id)
            .cloned()
            .collect();
        columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        Ok(columns)
    }

    fn insert_column(&self, new_column: &NewColumn) -> EngineResult<BoardColumn> {
        let mut state = self.state();
        if !state.projects.contains_key(&new_column.project_id) {
            return Err(EngineError::Storage(format!(
                "column {} references missing project {}",
                new_column.id, new_column.project_id
            )));
        }
        let column = BoardColumn {
            id: new_column.id.clone(),
            project_id: new_column.project_id.clone(),
            name: new_column.name.clone(),
            position: new_column.position,
            status_mapping: new_column.status_mapping,
        };
        state.columns.insert(column.id.clone(), column.clone());
        Ok(column)
    }

    fn update_column(
        &self,
        column_id: &str,
        changes: &ColumnChanges,
    ) -> EngineResult<Option<BoardColumn>> {
        let mut state = self.state();
        Ok(state.columns.get_mut(column_id).map(|column| {
            if let Some(name) = &changes.name {
                column.name = name.clone();
            }
            if let Some(status_mapping) = changes.status_mapping {
                column.status_mapping = status_mapping;
            }
            column.clone()
        }))
    }

    fn set_column_position(&self, column_id: &str, position: i32) -> EngineResult<()> {
        if let Some(column) = self.state().columns.get_mut(column_id) {
            column.position = position;
        }
        Ok(())
    }

    fn delete_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        Ok(self.state().columns.remove(column_id))
    }

    fn find_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        Ok(self.state().issues.get(issue_id).cloned())
    }

    fn find_issue_for_share(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        self.find_issue(issue_id)
    }

    fn find_issue_for_update(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        self.find_issue(issue_id)
    }

    fn find_issue_by_number(
        &self,
        project_id: &str,
        issue_number: i32,
    ) -> EngineResult<Option<Issue>> {
        Ok(self
            .state()
            .issues
            .values()
            .find(|issue| issue.project_id == project_id && issue.issue_number == issue_number)
            .cloned())
    }

    fn search_issues(&self, filter: &IssueFilter) -> EngineResult<Vec<Issue>> {
        let mut found: Vec<Issue> = self
            .state()
            .issues
            .values()
            .filter(|issue| filter.matches(issue))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.project_id
                .cmp(&b.project_id)
                .then(a.issue_number.cmp(&b.issue_number))
        });
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |limit| limit.max(0) as usize);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    fn insert_issue(&self, new_issue: &NewIssue) -> EngineResult<Issue> {
        let mut state = self.state();
        if !state.projects.contains_key(&new_issue.project_id) {
            return Err(EngineError::Storage(format!(
                "issue {} references missing project {}",
                new_issue.id, new_issue.project_id
            )));
        }
        if state.issues.values().any(|issue| {
            issue.project_id == new_issue.project_id && issue.issue_number == new_issue.issue_number
        }) {
            return Err(EngineError::Storage(format!(
                "issue number {} is already taken in project {}",
                new_issue.issue_number, new_issue.project_id
            )));
        }
        let now = Utc::now();
        let issue = Issue {
            id: new_issue.id.clone(),
            project_id: new_issue.project_id.clone(),
            issue_number: new_issue.issue_number,
            title: new_issue.title.clone(),
            description: new_issue.description.clone(),
            priority: new_issue.priority,
            issue_type: new_issue.issue_type,
            status: new_issue.status,
            column_id: new_issue.column_id.clone(),
            parent_issue_id: new_issue.parent_issue_id.clone(),
            epic_id: new_issue.epic_id.clone(),
            assignee_id: new_issue.assignee_id.clone(),
            reporter_id: new_issue.reporter_id.clone(),
            milestone_id: new_issue.milestone_id.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.issues.insert(issue.id.clone(), issue.clone());
        Ok(issue)
    }

    fn update_issue_if_version(
        &self,
        issue_id: &str,
        expected_version: i32,
        changes: &IssueChanges,
    ) -> EngineResult<Option<Issue>> {
        let mut state = self.state();
        let stored = match state.issues.get_mut(issue_id) {
            Some(issue) if issue.version == expected_version => issue,
            _ => return Ok(None),
        };
        let mut next = changes.apply_to(stored);
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(Some(next))
    }

    fn delete_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        Ok(self.state().issues.remove(issue_id))
    }

    fn child_statuses(&self, link: ChildLink<'_>) -> EngineResult<Vec<IssueStatus>> {
        Ok(self
            .state()
            .issues
            .values()
            .filter(|issue| match link {
                ChildLink::Epic(epic_id) => issue.epic_id.as_deref() == Some(epic_id),
                ChildLink::Parent(parent_id) => {
                    issue.parent_issue_id.as_deref() == Some(parent_id)
                }
            })
            .map(|issue| issue.status)
            .collect())
    }

    fn detach_column_issues(&self, column_id: &str) -> EngineResult<usize> {
        let mut state = self.state();
        Ok(detach_where(
            &mut state,
            Utc::now(),
            |issue| issue.column_id.as_deref() == Some(column_id),
            |issue| issue.column_id = None,
        ))
    }

    fn detach_epic_members(&self, epic_id: &str) -> EngineResult<usize> {
        let mut state = self.state();
        Ok(detach_where(
            &mut state,
            Utc::now(),
            |issue| issue.epic_id.as_deref() == Some(epic_id),
            |issue| issue.epic_id = None,
        ))
    }
}

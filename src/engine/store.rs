//! Storage seam between the engine and a concrete backend.
//!
//! The engine never mutates an issue row except through
//! [`IssueStore::update_issue_if_version`]; the only other writers are the
//! bulk detach helpers, which bump `version` themselves.

use super::error::EngineResult;
use super::model::{
    BoardColumn, ChildLink, ColumnChanges, Issue, IssueChanges, IssueFilter, IssueStatus,
    NewColumn, NewIssue, NewProject, Project,
};

pub trait IssueStore {
    /// Runs `f` atomically. Any `Err` rolls back everything `f` wrote.
    fn transaction<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Self) -> EngineResult<T>;

    // Projects

    fn find_project(&self, project_id: &str) -> EngineResult<Option<Project>>;

    fn find_project_by_key(&self, key: &str) -> EngineResult<Option<Project>>;

    fn insert_project(&self, project: &NewProject) -> EngineResult<Project>;

    /// Atomically increments the project's issue counter and returns the new
    /// value, or `None` when the project does not exist.
    fn increment_issue_counter(&self, project_id: &str) -> EngineResult<Option<i32>>;

    // Columns

    fn find_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>>;

    /// Same as `find_column`, but the row must stay as read until commit.
    fn find_column_for_share(&self, column_id: &str) -> EngineResult<Option<BoardColumn>>;

    /// Columns of a project, ordered by position.
    fn list_columns(&self, project_id: &str) -> EngineResult<Vec<BoardColumn>>;

    fn insert_column(&self, column: &NewColumn) -> EngineResult<BoardColumn>;

    fn update_column(
        &self,
        column_id: &str,
        changes: &ColumnChanges,
    ) -> EngineResult<Option<BoardColumn>>;

    fn set_column_position(&self, column_id: &str, position: i32) -> EngineResult<()>;

    fn delete_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>>;

    // Issues

    fn find_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>>;

    /// Same as `find_issue`, but the row must stay as read until commit.
    fn find_issue_for_share(&self, issue_id: &str) -> EngineResult<Option<Issue>>;

    /// Same as `find_issue`, but takes the row's write lock, so rows that are
    /// about to reference it wait until commit.
    fn find_issue_for_update(&self, issue_id: &str) -> EngineResult<Option<Issue>>;

    fn find_issue_by_number(
        &self,
        project_id: &str,
        issue_number: i32,
    ) -> EngineResult<Option<Issue>>;

    fn search_issues(&self, filter: &IssueFilter) -> EngineResult<Vec<Issue>>;

    fn insert_issue(&self, issue: &NewIssue) -> EngineResult<Issue>;

    /// Conditional write: applies `changes` and sets `version = expected + 1`
    /// only if the stored version equals `expected`. `None` when no row matched.
    fn update_issue_if_version(
        &self,
        issue_id: &str,
        expected_version: i32,
        changes: &IssueChanges,
    ) -> EngineResult<Option<Issue>>;

    fn delete_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>>;

    /// Statuses of the issues linked to an epic or parent.
    fn child_statuses(&self, link: ChildLink<'_>) -> EngineResult<Vec<IssueStatus>>;

    /// Takes every issue in the column off the board, bumping each version.
    fn detach_column_issues(&self, column_id: &str) -> EngineResult<usize>;

    /// Clears `epic_id` on every member of the epic, bumping each version.
    fn detach_epic_members(&self, epic_id: &str) -> EngineResult<usize>;
}

/// Hands out one store per request.
pub trait StoreProvider: Clone + Send + Sync + 'static {
    type Store: IssueStore;

    fn checkout(&self) -> EngineResult<Self::Store>;
}

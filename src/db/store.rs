use std::convert::TryFrom;

use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{Connection, PgConnection};

use crate::db::models::{ColumnChangeSet, IssueChangeSet};
use crate::db::repos::{column, issue, project};
use crate::engine::model::{
    BoardColumn, ChildLink, ColumnChanges, Issue, IssueChanges, IssueFilter, IssueStatus,
    NewColumn, NewIssue, NewProject, Project,
};
use crate::engine::{EngineError, EngineResult, IssueStore, ValidationReason};

/// Postgres-backed store over one pooled connection.
pub struct PgStore {
    conn: PooledConnection<ConnectionManager<PgConnection>>,
}

impl PgStore {
    pub fn new(conn: PooledConnection<ConnectionManager<PgConnection>>) -> Self {
        Self { conn }
    }

    fn conn(&self) -> &PgConnection {
        &self.conn
    }
}

fn issues_from_rows(rows: Vec<crate::db::models::IssueRow>) -> EngineResult<Vec<Issue>> {
    rows.into_iter().map(Issue::try_from).collect()
}

impl IssueStore for PgStore {
    fn transaction<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Self) -> EngineResult<T>,
    {
        self.conn().transaction(|| f(self))
    }

    fn find_project(&self, project_id: &str) -> EngineResult<Option<Project>> {
        Ok(project::find(self.conn(), project_id)?.map(Project::from))
    }

    fn find_project_by_key(&self, key: &str) -> EngineResult<Option<Project>> {
        Ok(project::find_by_key(self.conn(), key)?.map(Project::from))
    }

    fn insert_project(&self, new_project: &NewProject) -> EngineResult<Project> {
        match project::create(self.conn(), new_project.into()) {
            Ok(row) => Ok(row.into()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(ValidationReason::DuplicateProjectKey(new_project.key.clone()).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn increment_issue_counter(&self, project_id: &str) -> EngineResult<Option<i32>> {
        Ok(project::increment_issue_counter(self.conn(), project_id)?)
    }

    fn find_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        column::find(self.conn(), column_id)?
            .map(BoardColumn::try_from)
            .transpose()
    }

    fn find_column_for_share(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        column::find_for_share(self.conn(), column_id)?
            .map(BoardColumn::try_from)
            .transpose()
    }

    fn list_columns(&self, project_id: &str) -> EngineResult<Vec<BoardColumn>> {
        column::list_for_project(self.conn(), project_id)?
            .into_iter()
            .map(BoardColumn::try_from)
            .collect()
    }

    fn insert_column(&self, new_column: &NewColumn) -> EngineResult<BoardColumn> {
        BoardColumn::try_from(column::create(self.conn(), new_column.into())?)
    }

    fn update_column(
        &self,
        column_id: &str,
        changes: &ColumnChanges,
    ) -> EngineResult<Option<BoardColumn>> {
        column::update_fields(self.conn(), column_id, ColumnChangeSet::from(changes))?
            .map(BoardColumn::try_from)
            .transpose()
    }

    fn set_column_position(&self, column_id: &str, position: i32) -> EngineResult<()> {
        column::set_position(self.conn(), column_id, position)?;
        Ok(())
    }

    fn delete_column(&self, column_id: &str) -> EngineResult<Option<BoardColumn>> {
        column::delete_by_id(self.conn(), column_id)?
            .map(BoardColumn::try_from)
            .transpose()
    }

    fn find_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        issue::find(self.conn(), issue_id)?
            .map(Issue::try_from)
            .transpose()
    }

    fn find_issue_for_share(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        issue::find_for_share(self.conn(), issue_id)?
            .map(Issue::try_from)
            .transpose()
    }

    fn find_issue_for_update(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        issue::find_for_update(self.conn(), issue_id)?
            .map(Issue::try_from)
            .transpose()
    }

    fn find_issue_by_number(
        &self,
        project_id: &str,
        issue_number: i32,
    ) -> EngineResult<Option<Issue>> {
        issue::find_by_number(self.conn(), project_id, issue_number)?
            .map(Issue::try_from)
            .transpose()
    }

    fn search_issues(&self, filter: &IssueFilter) -> EngineResult<Vec<Issue>> {
        issues_from_rows(issue::search(self.conn(), filter)?)
    }

    fn insert_issue(&self, new_issue: &NewIssue) -> EngineResult<Issue> {
        Issue::try_from(issue::create(self.conn(), new_issue.into())?)
    }

    fn update_issue_if_version(
        &self,
        issue_id: &str,
        expected_version: i32,
        changes: &IssueChanges,
    ) -> EngineResult<Option<Issue>> {
        issue::update_if_version(
            self.conn(),
            issue_id,
            expected_version,
            IssueChangeSet::from(changes),
        )?
        .map(Issue::try_from)
        .transpose()
    }

    fn delete_issue(&self, issue_id: &str) -> EngineResult<Option<Issue>> {
        issue::delete_by_id(self.conn(), issue_id)?
            .map(Issue::try_from)
            .transpose()
    }

    fn child_statuses(&self, link: ChildLink<'_>) -> EngineResult<Vec<IssueStatus>> {
        issue::child_statuses(self.conn(), link)?
            .iter()
            .map(|status| {
                status.parse().map_err(|reason: ValidationReason| {
                    EngineError::Storage(format!("unreadable issue status: {}", reason))
                })
            })
            .collect()
    }

    fn detach_column_issues(&self, column_id: &str) -> EngineResult<usize> {
        Ok(issue::detach_column(self.conn(), column_id)?)
    }

    fn detach_epic_members(&self, epic_id: &str) -> EngineResult<usize> {
        Ok(issue::detach_epic(self.conn(), epic_id)?)
    }
}

use std::convert::TryFrom;

use chrono::{DateTime, Utc};

use super::schema::{columns, issues, projects};
use crate::engine::model::{
    BoardColumn, ColumnChanges, Issue, IssueChanges, NewColumn, NewIssue, NewProject, Project,
};
use crate::engine::{EngineError, ValidationReason};

fn corrupt(table: &str, id: &str, reason: ValidationReason) -> EngineError {
    EngineError::Storage(format!("{} row {} is unreadable: {}", table, id, reason))
}

#[derive(Queryable, Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub key: String,
    pub owner_id: String,
    pub issue_counter: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "projects"]
pub struct NewProjectRow<'a> {
    pub id: &'a str,
    pub key: &'a str,
    pub owner_id: &'a str,
}

impl<'a> From<&'a NewProject> for NewProjectRow<'a> {
    fn from(project: &'a NewProject) -> Self {
        NewProjectRow {
            id: &project.id,
            key: &project.key,
            owner_id: &project.owner_id,
        }
    }
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            key: row.key,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Queryable, Debug, Clone)]
pub struct ColumnRow {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position: i32,
    pub status_mapping: String,
}

#[derive(Insertable)]
#[table_name = "columns"]
pub struct NewColumnRow<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub name: &'a str,
    pub position: i32,
    pub status_mapping: &'static str,
}

impl<'a> From<&'a NewColumn> for NewColumnRow<'a> {
    fn from(column: &'a NewColumn) -> Self {
        NewColumnRow {
            id: &column.id,
            project_id: &column.project_id,
            name: &column.name,
            position: column.position,
            status_mapping: column.status_mapping.as_str(),
        }
    }
}

#[derive(AsChangeset, Default)]
#[table_name = "columns"]
pub struct ColumnChangeSet {
    pub name: Option<String>,
    pub status_mapping: Option<String>,
}

impl ColumnChangeSet {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status_mapping.is_none()
    }
}

impl From<&ColumnChanges> for ColumnChangeSet {
    fn from(changes: &ColumnChanges) -> Self {
        ColumnChangeSet {
            name: changes.name.clone(),
            status_mapping: changes.status_mapping.map(|m| m.as_str().to_string()),
        }
    }
}

impl TryFrom<ColumnRow> for BoardColumn {
    type Error = EngineError;

    fn try_from(row: ColumnRow) -> Result<Self, Self::Error> {
        let status_mapping = row
            .status_mapping
            .parse()
            .map_err(|reason| corrupt("columns", &row.id, reason))?;
        Ok(BoardColumn {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            position: row.position,
            status_mapping,
        })
    }
}

#[derive(Queryable, Debug, Clone)]
pub struct IssueRow {
    pub id: String,
    pub project_id: String,
    pub issue_number: i32,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub issue_type: String,
    pub status: String,
    pub column_id: Option<String>,
    pub parent_issue_id: Option<String>,
    pub epic_id: Option<String>,
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    pub milestone_id: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[table_name = "issues"]
pub struct NewIssueRow<'a> {
    pub id: &'a str,
    pub project_id: &'a str,
    pub issue_number: i32,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: &'static str,
    pub issue_type: &'static str,
    pub status: &'static str,
    pub column_id: Option<&'a str>,
    pub parent_issue_id: Option<&'a str>,
    pub epic_id: Option<&'a str>,
    pub assignee_id: Option<&'a str>,
    pub reporter_id: &'a str,
    pub milestone_id: Option<&'a str>,
}

impl<'a> From<&'a NewIssue> for NewIssueRow<'a> {
    fn from(issue: &'a NewIssue) -> Self {
        NewIssueRow {
            id: &issue.id,
            project_id: &issue.project_id,
            issue_number: issue.issue_number,
            title: &issue.title,
            description: &issue.description,
            priority: issue.priority.as_str(),
            issue_type: issue.issue_type.as_str(),
            status: issue.status.as_str(),
            column_id: issue.column_id.as_deref(),
            parent_issue_id: issue.parent_issue_id.as_deref(),
            epic_id: issue.epic_id.as_deref(),
            assignee_id: issue.assignee_id.as_deref(),
            reporter_id: &issue.reporter_id,
            milestone_id: issue.milestone_id.as_deref(),
        }
    }
}

/// Everything but `version` and `updated_at`, which the guarded write sets.
#[derive(AsChangeset, Default)]
#[table_name = "issues"]
pub struct IssueChangeSet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
    pub column_id: Option<Option<String>>,
    pub parent_issue_id: Option<Option<String>>,
    pub epic_id: Option<Option<String>>,
    pub assignee_id: Option<Option<String>>,
    pub milestone_id: Option<Option<String>>,
}

impl From<&IssueChanges> for IssueChangeSet {
    fn from(changes: &IssueChanges) -> Self {
        IssueChangeSet {
            title: changes.title.clone(),
            description: changes.description.clone(),
            priority: changes.priority.map(|p| p.as_str().to_string()),
            issue_type: changes.issue_type.map(|t| t.as_str().to_string()),
            status: changes.status.map(|s| s.as_str().to_string()),
            column_id: changes.column_id.clone(),
            parent_issue_id: changes.parent_issue_id.clone(),
            epic_id: changes.epic_id.clone(),
            assignee_id: changes.assignee_id.clone(),
            milestone_id: changes.milestone_id.clone(),
        }
    }
}

impl TryFrom<IssueRow> for Issue {
    type Error = EngineError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let priority = row
            .priority
            .parse()
            .map_err(|reason| corrupt("issues", &row.id, reason))?;
        let issue_type = row
            .issue_type
            .parse()
            .map_err(|reason| corrupt("issues", &row.id, reason))?;
        let status = row
            .status
            .parse()
            .map_err(|reason| corrupt("issues", &row.id, reason))?;
        Ok(Issue {
            id: row.id,
            project_id: row.project_id,
            issue_number: row.issue_number,
            title: row.title,
            description: row.description,
            priority,
            issue_type,
            status,
            column_id: row.column_id,
            parent_issue_id: row.parent_issue_id,
            epic_id: row.epic_id,
            assignee_id: row.assignee_id,
            reporter_id: row.reporter_id,
            milestone_id: row.milestone_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

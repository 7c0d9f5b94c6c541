use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::error::ValidationReason;

/// Maps an enum to its storage/wire spelling and back.
macro_rules! string_enum {
    ($name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationReason;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(ValidationReason::UnknownValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueType {
    Task,
    Bug,
    Feature,
    Improvement,
    Epic,
    Subtask,
}

string_enum!(IssueType, "issue_type" {
    Task => "task",
    Bug => "bug",
    Feature => "feature",
    Improvement => "improvement",
    Epic => "epic",
    Subtask => "subtask",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueStatus {
    Open,
    InProgress,
    Closed,
}

string_enum!(IssueStatus, "status" {
    Open => "open",
    InProgress => "in_progress",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(Priority, "priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Status an issue takes on when it enters a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusMapping {
    Open,
    InProgress,
    Closed,
    /// Entering the column leaves the status untouched.
    None,
}

string_enum!(StatusMapping, "status_mapping" {
    Open => "open",
    InProgress => "in_progress",
    Closed => "closed",
    None => "none",
});

impl StatusMapping {
    pub fn target_status(&self) -> Option<IssueStatus> {
        match self {
            StatusMapping::Open => Some(IssueStatus::Open),
            StatusMapping::InProgress => Some(IssueStatus::InProgress),
            StatusMapping::Closed => Some(IssueStatus::Closed),
            StatusMapping::None => None,
        }
    }
}

impl Default for StatusMapping {
    fn default() -> Self {
        StatusMapping::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub id: String,
    pub key: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position: i32,
    pub status_mapping: StatusMapping,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewColumn {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub position: i32,
    pub status_mapping: StatusMapping,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnChanges {
    pub name: Option<String>,
    pub status_mapping: Option<StatusMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub id: String,
    pub project_id: String,
    pub issue_number: i32,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub issue_type: IssueType,
    pub status: IssueStatus,
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

impl Issue {
    pub fn board_state(&self) -> BoardState {
        BoardState {
            column_id: self.column_id.clone(),
            status: self.status,
        }
    }
}

/// A fully resolved row ready for insertion; `issue_number` comes from the
/// sequence allocator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub id: String,
    pub project_id: String,
    pub issue_number: i32,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub issue_type: IssueType,
    pub status: IssueStatus,
    pub column_id: Option<String>,
    pub parent_issue_id: Option<String>,
    pub epic_id: Option<String>,
    pub assignee_id: Option<String>,
    pub reporter_id: String,
    pub milestone_id: Option<String>,
}

/// Field changes for a guarded write. The outer `Option` means "leave as is",
/// `Some(None)` clears a nullable link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub issue_type: Option<IssueType>,
    pub status: Option<IssueStatus>,
    pub column_id: Option<Option<String>>,
    pub parent_issue_id: Option<Option<String>>,
    pub epic_id: Option<Option<String>>,
    pub assignee_id: Option<Option<String>>,
    pub milestone_id: Option<Option<String>>,
}

impl IssueChanges {
    /// The issue as it would look after this change, version untouched.
    pub fn apply_to(&self, issue: &Issue) -> Issue {
        let mut next = issue.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(issue_type) = self.issue_type {
            next.issue_type = issue_type;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(column_id) = &self.column_id {
            next.column_id = column_id.clone();
        }
        if let Some(parent_issue_id) = &self.parent_issue_id {
            next.parent_issue_id = parent_issue_id.clone();
        }
        if let Some(epic_id) = &self.epic_id {
            next.epic_id = epic_id.clone();
        }
        if let Some(assignee_id) = &self.assignee_id {
            next.assignee_id = assignee_id.clone();
        }
        if let Some(milestone_id) = &self.milestone_id {
            next.milestone_id = milestone_id.clone();
        }
        next
    }

    /// True when the change touches a field the hierarchy validator guards.
    pub fn touches_hierarchy(&self) -> bool {
        self.issue_type.is_some()
            || self.parent_issue_id.is_some()
            || self.epic_id.is_some()
            || self.column_id.is_some()
    }
}

/// Board placement of an issue, reported before and after each transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub column_id: Option<String>,
    pub status: IssueStatus,
}

/// Which children a progress query counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildLink<'a> {
    Epic(&'a str),
    Parent(&'a str),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    pub ids: Vec<String>,
    pub project_id: Option<String>,
    pub column_id: Option<String>,
    pub epic_id: Option<String>,
    pub parent_issue_id: Option<String>,
    pub status: Option<IssueStatus>,
    pub issue_type: Option<IssueType>,
    pub assignee_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        (self.ids.is_empty() || self.ids.iter().any(|id| *id == issue.id))
            && self.project_id.as_ref().map_or(true, |p| *p == issue.project_id)
            && self
                .column_id
                .as_ref()
                .map_or(true, |c| issue.column_id.as_ref() == Some(c))
            && self
                .epic_id
                .as_ref()
                .map_or(true, |e| issue.epic_id.as_ref() == Some(e))
            && self
                .parent_issue_id
                .as_ref()
                .map_or(true, |p| issue.parent_issue_id.as_ref() == Some(p))
            && self.status.map_or(true, |s| s == issue.status)
            && self.issue_type.map_or(true, |t| t == issue.issue_type)
            && self
                .assignee_id
                .as_ref()
                .map_or(true, |a| issue.assignee_id.as_ref() == Some(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_their_own_spelling() {
        for status in [IssueStatus::Open, IssueStatus::InProgress, IssueStatus::Closed] {
            assert_eq!(status.as_str().parse::<IssueStatus>(), Ok(status));
        }
        assert_eq!("subtask".parse::<IssueType>(), Ok(IssueType::Subtask));
        assert_eq!("none".parse::<StatusMapping>(), Ok(StatusMapping::None));
    }

    #[test]
    fn unknown_spelling_names_the_field() {
        let err = "done".parse::<IssueStatus>().unwrap_err();
        assert_eq!(
            err,
            ValidationReason::UnknownValue {
                field: "status",
                value: "done".to_string()
            }
        );
    }

    #[test]
    fn none_mapping_has_no_target() {
        assert_eq!(StatusMapping::None.target_status(), None);
        assert_eq!(
            StatusMapping::Closed.target_status(),
            Some(IssueStatus::Closed)
        );
    }
}

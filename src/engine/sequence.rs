//! Per-project issue numbering and the `PROJ-12` key format.

use std::fmt;
use std::str::FromStr;

use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::store::IssueStore;

/// Hands out issue numbers from the project's counter row.
///
/// The counter is incremented by the store in a single atomic statement inside
/// the caller's create transaction, so two creates in one project serialize on
/// that row and creates in different projects never touch the same row. A
/// rolled-back create rolls the counter back too; a committed number is never
/// handed out again, even after the issue is deleted.
pub struct SequenceAllocator;

impl SequenceAllocator {
    pub fn allocate<S: IssueStore>(store: &S, project_id: &str) -> EngineResult<i32> {
        let number = store
            .increment_issue_counter(project_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Project, project_id))?;
        tracing::debug!(project_id, issue_number = number, "allocated issue number");
        Ok(number)
    }
}

pub fn validate_project_key(key: &str) -> Result<(), ValidationReason> {
    let mut chars = key.chars();
    let starts_with_letter = chars.next().map_or(false, |c| c.is_ascii_uppercase());
    let rest_ok = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if starts_with_letter && rest_ok && (2..=10).contains(&key.len()) {
        Ok(())
    } else {
        Err(ValidationReason::InvalidProjectKey(key.to_string()))
    }
}

/// User-facing issue identifier, rendered as `{project_key}-{issue_number}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub project_key: String,
    pub issue_number: i32,
}

impl IssueKey {
    pub fn new(project_key: impl Into<String>, issue_number: i32) -> Self {
        Self {
            project_key: project_key.into(),
            issue_number,
        }
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project_key, self.issue_number)
    }
}

impl FromStr for IssueKey {
    type Err = ValidationReason;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationReason::InvalidIssueKey(value.to_string());
        let (project_key, number) = value.rsplit_once('-').ok_or_else(invalid)?;
        validate_project_key(project_key).map_err(|_| invalid())?;
        if number.starts_with('+') {
            return Err(invalid());
        }
        let issue_number: i32 = number.parse().map_err(|_| invalid())?;
        if issue_number < 1 {
            return Err(invalid());
        }
        Ok(IssueKey::new(project_key, issue_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::engine::model::NewProject;
    use crate::engine::store::IssueStore;

    #[test]
    fn project_keys() {
        assert!(validate_project_key("PROJ").is_ok());
        assert!(validate_project_key("A1").is_ok());
        assert!(validate_project_key("P").is_err());
        assert!(validate_project_key("proj").is_err());
        assert!(validate_project_key("1ABC").is_err());
        assert!(validate_project_key("ABCDEFGHIJK").is_err());
        assert!(validate_project_key("PR-J").is_err());
    }

    #[test]
    fn issue_key_parses_and_renders() {
        let key: IssueKey = "DEMO-12".parse().unwrap();
        assert_eq!(key, IssueKey::new("DEMO", 12));
        assert_eq!(key.to_string(), "DEMO-12");
    }

    #[test]
    fn malformed_issue_keys_are_rejected() {
        for bad in ["DEMO", "DEMO-", "DEMO-0", "DEMO--1", "demo-1", "DEMO-+4", "-3"] {
            assert!(bad.parse::<IssueKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn allocation_counts_up_per_project() {
        let store = MemoryStore::new();
        for (id, key) in [("p1", "ONE"), ("p2", "TWO")] {
            store
                .insert_project(&NewProject {
                    id: id.into(),
                    key: key.into(),
                    owner_id: "u".into(),
                })
                .unwrap();
        }
        assert_eq!(SequenceAllocator::allocate(&store, "p1").unwrap(), 1);
        assert_eq!(SequenceAllocator::allocate(&store, "p1").unwrap(), 2);
        assert_eq!(SequenceAllocator::allocate(&store, "p2").unwrap(), 1);
    }

    #[test]
    fn allocation_for_missing_project_is_not_found() {
        let store = MemoryStore::new();
        let err = SequenceAllocator::allocate(&store, "nope").unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                entity: Entity::Project,
                ..
            }
        ));
    }
}

//! Optimistic concurrency: every update and move names the version it was
//! computed from, and the write only lands if that version is still current.

use super::error::{EngineError, EngineResult, ValidationReason};
use super::model::{Issue, IssueChanges};
use super::store::IssueStore;

pub struct VersionGuard;

impl VersionGuard {
    /// Rejects tokens no stored row can ever carry.
    pub fn check_token(version: i32) -> Result<(), ValidationReason> {
        if version < 1 {
            return Err(ValidationReason::InvalidVersion(version));
        }
        if version == i32::MAX {
            return Err(ValidationReason::OutOfRange {
                field: "version",
                value: i64::from(version),
            });
        }
        Ok(())
    }

    /// One conditional write carrying all of `changes` plus `version + 1`.
    ///
    /// Zero matched rows means the version moved on (or the row vanished)
    /// and surfaces as `Conflict`; the caller decides whether to refetch and
    /// retry.
    pub fn write<S: IssueStore>(
        store: &S,
        issue_id: &str,
        expected_version: i32,
        changes: &IssueChanges,
    ) -> EngineResult<Issue> {
        Self::check_token(expected_version)?;

        match store.update_issue_if_version(issue_id, expected_version, changes)? {
            Some(issue) => {
                debug_assert_eq!(issue.version, expected_version + 1);
                tracing::debug!(issue_id, version = issue.version, "guarded write applied");
                Ok(issue)
            }
            None => {
                tracing::info!(
                    issue_id,
                    expected_version,
                    "guarded write lost the race, reporting conflict"
                );
                Err(EngineError::Conflict {
                    issue_id: issue_id.to_string(),
                    expected: expected_version,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::engine::model::{IssueStatus, IssueType, NewIssue, NewProject, Priority};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_project(&NewProject {
                id: "p1".into(),
                key: "VG".into(),
                owner_id: "owner".into(),
            })
            .unwrap();
        store
            .insert_issue(&NewIssue {
                id: "i1".into(),
                project_id: "p1".into(),
                issue_number: 1,
                title: "guarded".into(),
                description: String::new(),
                priority: Priority::Low,
                issue_type: IssueType::Task,
                status: IssueStatus::Open,
                column_id: None,
                parent_issue_id: None,
                epic_id: None,
                assignee_id: None,
                reporter_id: "owner".into(),
                milestone_id: None,
            })
            .unwrap();
        store
    }

    fn retitle(title: &str) -> IssueChanges {
        IssueChanges {
            title: Some(title.to_string()),
            ..IssueChanges::default()
        }
    }

    #[test]
    fn matching_version_bumps_by_one() {
        let store = seeded();
        let issue = VersionGuard::write(&store, "i1", 1, &retitle("first")).unwrap();
        assert_eq!(issue.version, 2);
        assert_eq!(issue.title, "first");
    }

    #[test]
    fn stale_version_conflicts_and_leaves_row_alone() {
        let store = seeded();
        VersionGuard::write(&store, "i1", 1, &retitle("first")).unwrap();

        let err = VersionGuard::write(&store, "i1", 1, &retitle("second")).unwrap_err();
        assert!(err.is_conflict());

        let stored = store.find_issue("i1").unwrap().unwrap();
        assert_eq!(stored.title, "first");
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn empty_change_still_bumps_version() {
        let store = seeded();
        let issue = VersionGuard::write(&store, "i1", 1, &IssueChanges::default()).unwrap();
        assert_eq!(issue.version, 2);
    }

    #[test]
    fn missing_row_reports_conflict() {
        let store = seeded();
        let err = VersionGuard::write(&store, "ghost", 1, &retitle("x")).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn unusable_tokens_are_validation_errors() {
        assert_eq!(
            VersionGuard::check_token(0),
            Err(ValidationReason::InvalidVersion(0))
        );
        assert!(VersionGuard::check_token(-3).is_err());
        assert!(VersionGuard::check_token(i32::MAX).is_err());
        assert!(VersionGuard::check_token(1).is_ok());
    }
}

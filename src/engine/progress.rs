//! Read-only completion counts for epics and subtask groups.

use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::model::{ChildLink, IssueStatus, IssueType};
use super::store::IssueStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: u64,
    pub completed: u64,
}

impl Progress {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = IssueStatus>,
    {
        statuses.into_iter().fold(Progress::default(), |acc, status| Progress {
            total: acc.total + 1,
            completed: acc.completed + u64::from(status == IssueStatus::Closed),
        })
    }

    /// Completed share in `0.0..=1.0`; an empty group counts as 0.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub struct ProgressAggregator;

impl ProgressAggregator {
    /// Issues grouped under the epic, counted by `status = closed`.
    pub fn epic<S: IssueStore>(store: &S, epic_id: &str) -> EngineResult<Progress> {
        let epic = store
            .find_issue(epic_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Epic, epic_id))?;
        if epic.issue_type != IssueType::Epic {
            return Err(ValidationReason::NotAnEpic.into());
        }
        Ok(Progress::tally(store.child_statuses(ChildLink::Epic(epic_id))?))
    }

    /// Subtasks of the issue, counted by `status = closed`.
    pub fn subtasks<S: IssueStore>(store: &S, issue_id: &str) -> EngineResult<Progress> {
        let parent = store
            .find_issue(issue_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Issue, issue_id))?;
        if parent.issue_type == IssueType::Subtask {
            return Err(ValidationReason::NotAParent.into());
        }
        Ok(Progress::tally(store.child_statuses(ChildLink::Parent(issue_id))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mixed_statuses() {
        let progress = Progress::tally([
            IssueStatus::Open,
            IssueStatus::Closed,
            IssueStatus::Closed,
            IssueStatus::InProgress,
        ]);
        assert_eq!(
            progress,
            Progress {
                total: 4,
                completed: 2
            }
        );
        assert!((progress.ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn no_children_is_zero_zero() {
        let progress = Progress::tally(Vec::new());
        assert_eq!(progress, Progress::default());
        assert_eq!(progress.ratio(), 0.0);
    }

    fn any_status() -> impl Strategy<Value = IssueStatus> {
        prop_oneof![
            Just(IssueStatus::Open),
            Just(IssueStatus::InProgress),
            Just(IssueStatus::Closed),
        ]
    }

    proptest! {
        #[test]
        fn completed_counts_closed_children(statuses in prop::collection::vec(any_status(), 0..64)) {
            let progress = Progress::tally(statuses.iter().copied());
            let closed = statuses.iter().filter(|s| **s == IssueStatus::Closed).count() as u64;
            prop_assert_eq!(progress.total, statuses.len() as u64);
            prop_assert_eq!(progress.completed, closed);
            prop_assert!(progress.completed <= progress.total);
            prop_assert!((0.0..=1.0).contains(&progress.ratio()));
        }
    }
}

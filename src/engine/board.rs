//! Keeps an issue's column and status coherent.
//!
//! Each column carries an explicit `status_mapping`; display names play no
//! part. Status changes are free in every direction, including reopening a
//! closed issue, because a drag can skip columns.

use super::error::{EngineResult, ValidationReason};
use super::model::{BoardColumn, Issue, IssueChanges, IssueStatus};
use super::store::IssueStore;

pub struct BoardConsistency;

impl BoardConsistency {
    /// Changes that place an issue in `column`. The column must already be
    /// known to belong to the issue's project.
    pub fn plan_move(column: &BoardColumn) -> IssueChanges {
        IssueChanges {
            column_id: Some(Some(column.id.clone())),
            status: column.status_mapping.target_status(),
            ..IssueChanges::default()
        }
    }

    /// Status an issue gets when it enters `column`, given an optional
    /// explicitly requested status. `None` means "leave it as it is".
    pub fn status_on_entry(
        requested: Option<IssueStatus>,
        column: Option<&BoardColumn>,
    ) -> Result<Option<IssueStatus>, ValidationReason> {
        let mapped = column.and_then(|c| c.status_mapping.target_status());
        match (requested, mapped) {
            (Some(requested), Some(mapped)) if requested != mapped => {
                Err(ValidationReason::StatusColumnMismatch {
                    status: requested.to_string(),
                    mapping: mapped.to_string(),
                })
            }
            (requested, mapped) => Ok(mapped.or(requested)),
        }
    }

    /// Aligns the column/status part of an update with the board.
    ///
    /// `target_column` is the resolved column when the update sets one.
    pub fn reconcile_update<S: IssueStore>(
        store: &S,
        current: &Issue,
        changes: &mut IssueChanges,
        target_column: Option<&BoardColumn>,
    ) -> EngineResult<()> {
        let entering_column = changes.column_id.as_ref().map(Option::is_some);
        match entering_column {
            Some(true) => {
                changes.status = Self::status_on_entry(changes.status, target_column)?;
            }
            Some(false) => {}
            None => {
                if let Some(status) = changes.status {
                    if status != current.status {
                        changes.column_id = Self::relocate(store, current, status)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Column change needed after a direct status edit, if any.
    fn relocate<S: IssueStore>(
        store: &S,
        current: &Issue,
        status: IssueStatus,
    ) -> EngineResult<Option<Option<String>>> {
        let column = match &current.column_id {
            Some(column_id) => store.find_column_for_share(column_id)?,
            None => return Ok(None),
        };
        let disagrees = column
            .as_ref()
            .and_then(|c| c.status_mapping.target_status())
            .map_or(false, |mapped| mapped != status);
        if !disagrees {
            return Ok(None);
        }

        let columns = store.list_columns(&current.project_id)?;
        Ok(Self::relocation_target(&columns, status).map(|c| Some(c.id.clone())))
    }

    /// Leftmost column whose mapping yields `status`.
    pub fn relocation_target(columns: &[BoardColumn], status: IssueStatus) -> Option<&BoardColumn> {
        columns
            .iter()
            .filter(|c| c.status_mapping.target_status() == Some(status))
            .min_by_key(|c| c.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::StatusMapping;

    fn column(id: &str, position: i32, status_mapping: StatusMapping) -> BoardColumn {
        BoardColumn {
            id: id.to_string(),
            project_id: "p1".to_string(),
            name: id.to_string(),
            position,
            status_mapping,
        }
    }

    #[test]
    fn move_into_mapped_column_sets_status() {
        let changes = BoardConsistency::plan_move(&column("done", 2, StatusMapping::Closed));
        assert_eq!(changes.column_id, Some(Some("done".to_string())));
        assert_eq!(changes.status, Some(IssueStatus::Closed));
    }

    #[test]
    fn move_into_unmapped_column_keeps_status() {
        let changes = BoardConsistency::plan_move(&column("icebox", 0, StatusMapping::None));
        assert_eq!(changes.status, None);
        assert_eq!(changes.column_id, Some(Some("icebox".to_string())));
    }

    #[test]
    fn explicit_status_must_agree_with_mapping() {
        let done = column("done", 2, StatusMapping::Closed);
        assert_eq!(
            BoardConsistency::status_on_entry(Some(IssueStatus::Closed), Some(&done)),
            Ok(Some(IssueStatus::Closed))
        );
        assert!(matches!(
            BoardConsistency::status_on_entry(Some(IssueStatus::Open), Some(&done)),
            Err(ValidationReason::StatusColumnMismatch { .. })
        ));

        let icebox = column("icebox", 0, StatusMapping::None);
        assert_eq!(
            BoardConsistency::status_on_entry(Some(IssueStatus::InProgress), Some(&icebox)),
            Ok(Some(IssueStatus::InProgress))
        );
        assert_eq!(BoardConsistency::status_on_entry(None, None), Ok(None));
    }

    #[test]
    fn relocation_picks_leftmost_matching_column() {
        let columns = vec![
            column("review", 3, StatusMapping::InProgress),
            column("todo", 0, StatusMapping::Open),
            column("doing", 1, StatusMapping::InProgress),
            column("done", 4, StatusMapping::Closed),
        ];
        let target = BoardConsistency::relocation_target(&columns, IssueStatus::InProgress);
        assert_eq!(target.map(|c| c.id.as_str()), Some("doing"));
    }

    #[test]
    fn relocation_without_matching_column_finds_nothing() {
        let columns = vec![column("todo", 0, StatusMapping::Open)];
        assert!(BoardConsistency::relocation_target(&columns, IssueStatus::Closed).is_none());
    }
}

//! Board column administration. Columns are not version-guarded; every
//! issue a column change touches is.

use std::collections::HashSet;

use uuid::Uuid;

use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::issues::IssueEngine;
use super::model::{BoardColumn, ColumnChanges, NewColumn, StatusMapping};
use super::store::IssueStore;

impl IssueEngine {
    /// Appends a column to the right end of the project's board.
    pub fn create_column<S: IssueStore>(
        &self,
        store: &S,
        project_id: &str,
        name: &str,
        status_mapping: StatusMapping,
    ) -> EngineResult<BoardColumn> {
        if name.trim().is_empty() {
            return Err(ValidationReason::EmptyField("name").into());
        }

        let column = store.transaction(|tx| {
            tx.find_project(project_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Project, project_id))?;
            let position = tx
                .list_columns(project_id)?
                .iter()
                .map(|c| c.position + 1)
                .max()
                .unwrap_or(0);
            tx.insert_column(&NewColumn {
                id: Uuid::new_v4().to_string(),
                project_id: project_id.to_string(),
                name: name.to_string(),
                position,
                status_mapping,
            })
        })?;

        tracing::info!(
            column_id = %column.id,
            project_id,
            position = column.position,
            status_mapping = %column.status_mapping,
            "column created"
        );
        Ok(column)
    }

    pub fn update_column<S: IssueStore>(
        &self,
        store: &S,
        column_id: &str,
        changes: &ColumnChanges,
    ) -> EngineResult<BoardColumn> {
        if matches!(&changes.name, Some(name) if name.trim().is_empty()) {
            return Err(ValidationReason::EmptyField("name").into());
        }
        store.transaction(|tx| {
            tx.update_column(column_id, changes)?
                .ok_or_else(|| EngineError::not_found(Entity::Column, column_id))
        })
    }

    /// Rewrites positions to follow `ordered_ids`, which must name every
    /// column of the project exactly once.
    pub fn reorder_columns<S: IssueStore>(
        &self,
        store: &S,
        project_id: &str,
        ordered_ids: &[String],
    ) -> EngineResult<Vec<BoardColumn>> {
        store.transaction(|tx| {
            tx.find_project(project_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Project, project_id))?;

            let existing: HashSet<String> = tx
                .list_columns(project_id)?
                .into_iter()
                .map(|c| c.id)
                .collect();
            let requested: HashSet<String> = ordered_ids.iter().cloned().collect();
            if requested.len() != ordered_ids.len() || requested != existing {
                return Err(ValidationReason::ColumnOrderMismatch.into());
            }

            for (position, column_id) in ordered_ids.iter().enumerate() {
                let position = i32::try_from(position).map_err(|_| ValidationReason::OutOfRange {
                    field: "position",
                    value: position as i64,
                })?;
                tx.set_column_position(column_id, position)?;
            }
            tx.list_columns(project_id)
        })
    }

    /// Removes the column; its issues stay, off the board.
    pub fn delete_column<S: IssueStore>(
        &self,
        store: &S,
        column_id: &str,
    ) -> EngineResult<BoardColumn> {
        let (column, detached) = store.transaction(|tx| {
            let detached = tx.detach_column_issues(column_id)?;
            let column = tx
                .delete_column(column_id)?
                .ok_or_else(|| EngineError::not_found(Entity::Column, column_id))?;
            Ok((column, detached))
        })?;

        tracing::info!(column_id, detached, "column deleted");
        Ok(column)
    }

    pub fn get_column<S: IssueStore>(&self, store: &S, column_id: &str) -> EngineResult<BoardColumn> {
        store
            .find_column(column_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Column, column_id))
    }

    /// Columns named in `ids`, narrowed to one project when given, in board
    /// order. Unknown ids are skipped.
    pub fn search_columns<S: IssueStore>(
        &self,
        store: &S,
        ids: &[String],
        project_id: Option<&str>,
    ) -> EngineResult<Vec<BoardColumn>> {
        let mut found = match project_id {
            Some(project_id) => store.list_columns(project_id)?,
            None => {
                let mut found = Vec::with_capacity(ids.len());
                for column_id in ids {
                    found.extend(store.find_column(column_id)?);
                }
                found
            }
        };
        if !ids.is_empty() {
            found.retain(|column| ids.contains(&column.id));
        }
        found.sort_by(|a, b| {
            a.project_id
                .cmp(&b.project_id)
                .then(a.position.cmp(&b.position))
        });
        found.dedup_by(|a, b| a.id == b.id);
        Ok(found)
    }

    pub fn list_columns<S: IssueStore>(
        &self,
        store: &S,
        project_id: &str,
    ) -> EngineResult<Vec<BoardColumn>> {
        store.list_columns(project_id)
    }
}

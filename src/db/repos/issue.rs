use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{delete, insert_into, update, QueryResult};

use crate::db::models::{IssueChangeSet, IssueRow, NewIssueRow};
use crate::db::schema::issues;
use crate::engine::model::{ChildLink, IssueFilter};

pub fn find(conn: &PgConnection, issue_id: &str) -> QueryResult<Option<IssueRow>> {
    issues::table
        .find(issue_id)
        .first::<IssueRow>(conn)
        .optional()
}

/// `FOR SHARE`: a referenced parent or epic stays as read until commit.
pub fn find_for_share(conn: &PgConnection, issue_id: &str) -> QueryResult<Option<IssueRow>> {
    issues::table
        .find(issue_id)
        .for_share()
        .first::<IssueRow>(conn)
        .optional()
}

/// `FOR UPDATE`: concurrent `FOR SHARE` readers of this row wait for the
/// rewrite and see its result.
pub fn find_for_update(conn: &PgConnection, issue_id: &str) -> QueryResult<Option<IssueRow>> {
    issues::table
        .find(issue_id)
        .for_update()
        .first::<IssueRow>(conn)
        .optional()
}

pub fn find_by_number(
    conn: &PgConnection,
    project_id: &str,
    issue_number: i32,
) -> QueryResult<Option<IssueRow>> {
    issues::table
        .filter(issues::project_id.eq(project_id))
        .filter(issues::issue_number.eq(issue_number))
        .first::<IssueRow>(conn)
        .optional()
}

pub fn search(conn: &PgConnection, filter: &IssueFilter) -> QueryResult<Vec<IssueRow>> {
    let mut query = issues::table.into_boxed();

    if !filter.ids.is_empty() {
        query = query.filter(issues::id.eq_any(&filter.ids));
    }
    if let Some(project_id) = &filter.project_id {
        query = query.filter(issues::project_id.eq(project_id));
    }
    if let Some(column_id) = &filter.column_id {
        query = query.filter(issues::column_id.eq(column_id));
    }
    if let Some(epic_id) = &filter.epic_id {
        query = query.filter(issues::epic_id.eq(epic_id));
    }
    if let Some(parent_issue_id) = &filter.parent_issue_id {
        query = query.filter(issues::parent_issue_id.eq(parent_issue_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(issues::status.eq(status.as_str()));
    }
    if let Some(issue_type) = filter.issue_type {
        query = query.filter(issues::issue_type.eq(issue_type.as_str()));
    }
    if let Some(assignee_id) = &filter.assignee_id {
        query = query.filter(issues::assignee_id.eq(assignee_id));
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = filter.offset {
        query = query.offset(offset);
    }

    query
        .order((issues::project_id.asc(), issues::issue_number.asc()))
        .load::<IssueRow>(conn)
}

pub fn create(conn: &PgConnection, new_issue: NewIssueRow<'_>) -> QueryResult<IssueRow> {
    insert_into(issues::table)
        .values(new_issue)
        .get_result(conn)
}

/// `UPDATE ... WHERE id = ? AND version = ?`, bumping the version in the same
/// statement. `None` when the row is gone or its version moved on.
pub fn update_if_version(
    conn: &PgConnection,
    issue_id: &str,
    expected_version: i32,
    change_set: IssueChangeSet,
) -> QueryResult<Option<IssueRow>> {
    update(
        issues::table
            .filter(issues::id.eq(issue_id))
            .filter(issues::version.eq(expected_version)),
    )
    .set((
        change_set,
        issues::version.eq(expected_version + 1),
        issues::updated_at.eq(Utc::now()),
    ))
    .get_result(conn)
    .optional()
}

pub fn delete_by_id(conn: &PgConnection, issue_id: &str) -> QueryResult<Option<IssueRow>> {
    delete(issues::table.find(issue_id))
        .get_result(conn)
        .optional()
}

pub fn child_statuses(conn: &PgConnection, link: ChildLink<'_>) -> QueryResult<Vec<String>> {
    let query = issues::table.select(issues::status).into_boxed();
    let query = match link {
        ChildLink::Epic(epic_id) => query.filter(issues::epic_id.eq(epic_id)),
        ChildLink::Parent(parent_id) => query.filter(issues::parent_issue_id.eq(parent_id)),
    };
    query.load::<String>(conn)
}

pub fn detach_column(conn: &PgConnection, column_id: &str) -> QueryResult<usize> {
    update(issues::table.filter(issues::column_id.eq(column_id)))
        .set((
            issues::column_id.eq(None::<String>),
            issues::version.eq(issues::version + 1),
            issues::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

pub fn detach_epic(conn: &PgConnection, epic_id: &str) -> QueryResult<usize> {
    update(issues::table.filter(issues::epic_id.eq(epic_id)))
        .set((
            issues::epic_id.eq(None::<String>),
            issues::version.eq(issues::version + 1),
            issues::updated_at.eq(Utc::now()),
        ))
        .execute(conn)
}

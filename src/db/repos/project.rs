use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{insert_into, update, QueryResult};

use crate::db::models::{NewProjectRow, ProjectRow};
use crate::db::schema::projects;

pub fn find(conn: &PgConnection, project_id: &str) -> QueryResult<Option<ProjectRow>> {
    projects::table
        .find(project_id)
        .first::<ProjectRow>(conn)
        .optional()
}

pub fn find_by_key(conn: &PgConnection, key: &str) -> QueryResult<Option<ProjectRow>> {
    projects::table
        .filter(projects::key.eq(key))
        .first::<ProjectRow>(conn)
        .optional()
}

pub fn create(conn: &PgConnection, new_project: NewProjectRow<'_>) -> QueryResult<ProjectRow> {
    insert_into(projects::table)
        .values(new_project)
        .get_result(conn)
}

/// Single-statement increment; the row lock it takes serializes concurrent
/// creates in the same project until commit.
pub fn increment_issue_counter(conn: &PgConnection, project_id: &str) -> QueryResult<Option<i32>> {
    update(projects::table.find(project_id))
        .set(projects::issue_counter.eq(projects::issue_counter + 1))
        .returning(projects::issue_counter)
        .get_result::<i32>(conn)
        .optional()
}

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::{delete, insert_into, update, QueryResult};

use crate::db::models::{ColumnChangeSet, ColumnRow, NewColumnRow};
use crate::db::schema::columns;

pub fn find(conn: &PgConnection, column_id: &str) -> QueryResult<Option<ColumnRow>> {
    columns::table
        .find(column_id)
        .first::<ColumnRow>(conn)
        .optional()
}

/// `FOR SHARE`: the column cannot be deleted or remapped before commit.
pub fn find_for_share(conn: &PgConnection, column_id: &str) -> QueryResult<Option<ColumnRow>> {
    columns::table
        .find(column_id)
        .for_share()
        .first::<ColumnRow>(conn)
        .optional()
}

pub fn list_for_project(conn: &PgConnection, project_id: &str) -> QueryResult<Vec<ColumnRow>> {
    columns::table
        .filter(columns::project_id.eq(project_id))
        .order(columns::position.asc())
        .load::<ColumnRow>(conn)
}

pub fn create(conn: &PgConnection, new_column: NewColumnRow<'_>) -> QueryResult<ColumnRow> {
    insert_into(columns::table)
        .values(new_column)
        .get_result(conn)
}

pub fn update_fields(
    conn: &PgConnection,
    column_id: &str,
    change_set: ColumnChangeSet,
) -> QueryResult<Option<ColumnRow>> {
    if change_set.is_empty() {
        return find(conn, column_id);
    }
    update(columns::table.find(column_id))
        .set(change_set)
        .get_result(conn)
        .optional()
}

pub fn set_position(conn: &PgConnection, column_id: &str, position: i32) -> QueryResult<usize> {
    update(columns::table.find(column_id))
        .set(columns::position.eq(position))
        .execute(conn)
}

pub fn delete_by_id(conn: &PgConnection, column_id: &str) -> QueryResult<Option<ColumnRow>> {
    delete(columns::table.find(column_id))
        .get_result(conn)
        .optional()
}

table! {
    projects (id) {
        id -> Bpchar,
        key -> Varchar,
        owner_id -> Varchar,
        issue_counter -> Int4,
        created_at -> Timestamptz,
    }
}

table! {
    columns (id) {
        id -> Bpchar,
        project_id -> Bpchar,
        name -> Varchar,
        position -> Int4,
        status_mapping -> Varchar,
    }
}

table! {
    issues (id) {
        id -> Bpchar,
        project_id -> Bpchar,
        issue_number -> Int4,
        title -> Varchar,
        description -> Text,
        priority -> Varchar,
        issue_type -> Varchar,
        status -> Varchar,
        column_id -> Nullable<Bpchar>,
        parent_issue_id -> Nullable<Bpchar>,
        epic_id -> Nullable<Bpchar>,
        assignee_id -> Nullable<Varchar>,
        reporter_id -> Varchar,
        milestone_id -> Nullable<Varchar>,
        version -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

allow_tables_to_appear_in_same_query!(
    projects,
    columns,
    issues,
);

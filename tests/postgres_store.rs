//! Runs against a live Postgres when `DATABASE_URL` is set; every test is a
//! no-op otherwise. The schema is recreated once per test binary.

use std::env;
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::{Connection, PgConnection};
use uuid::Uuid;

use issue_tracker::db::connection::{init_pool, PgPool};
use issue_tracker::db::store::PgStore;
use issue_tracker::engine::model::{Issue, IssueChanges, IssueStatus, IssueType, StatusMapping};
use issue_tracker::engine::{
    CreateIssueCommand, EngineError, IssueEngine, MoveIssueCommand, NoopSink, StoreProvider,
    UpdateIssueCommand, ValidationReason,
};

const UP: &str = include_str!("../migrations/2022-07-01-120000_create_issue_tracker/up.sql");
const DOWN: &str = include_str!("../migrations/2022-07-01-120000_create_issue_tracker/down.sql");

static SCHEMA: Once = Once::new();

fn pool() -> Option<PgPool> {
    let database_url = env::var("DATABASE_URL").ok()?;
    SCHEMA.call_once(|| {
        let conn = PgConnection::establish(&database_url).expect("connect to DATABASE_URL");
        conn.batch_execute(DOWN).expect("drop schema");
        conn.batch_execute(UP).expect("create schema");
    });
    Some(init_pool(&database_url, 16).expect("build pool"))
}

/// Unique per test run so tests can share one schema.
fn project_key() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(7)
        .collect();
    format!("P{}", suffix.to_uppercase())
}

fn engine() -> Arc<IssueEngine> {
    Arc::new(IssueEngine::new(Arc::new(NoopSink)))
}

/// Holds `FOR SHARE` on `target` from a separate session while `rewrite`
/// runs on the pool, then inserts a row hanging off `target` with
/// `link_column` and commits. Returns the rewrite's outcome and the new row id.
fn rewrite_while_child_is_added<F>(
    pool: &PgPool,
    target: &Issue,
    link_column: &str,
    child_type: &str,
    rewrite: F,
) -> (Result<Issue, EngineError>, String)
where
    F: FnOnce(&PgStore) -> Result<Issue, EngineError> + Send + 'static,
{
    let database_url = env::var("DATABASE_URL").unwrap();
    let session = PgConnection::establish(&database_url).unwrap();
    session
        .batch_execute(&format!(
            "BEGIN; SELECT id FROM issues WHERE id = '{}' FOR SHARE;",
            target.id
        ))
        .unwrap();

    let writer = {
        let pool = pool.clone();
        thread::spawn(move || {
            let store = pool.checkout().unwrap();
            rewrite(&store)
        })
    };
    thread::sleep(Duration::from_millis(300));

    let child_id = Uuid::new_v4().to_string();
    session
        .batch_execute(&format!(
            "INSERT INTO issues (id, project_id, issue_number, title, issue_type, reporter_id, {link}) \
             VALUES ('{id}', '{project}', 900, 'late child', '{kind}', 'user', '{target}'); COMMIT;",
            link = link_column,
            id = child_id,
            project = target.project_id,
            kind = child_type,
            target = target.id,
        ))
        .unwrap();

    (writer.join().unwrap(), child_id)
}

#[test]
fn counter_hands_out_distinct_numbers_under_concurrency() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            let engine = engine.clone();
            let project_id = project.id.clone();
            thread::spawn(move || {
                let store = pool.checkout().unwrap();
                engine
                    .create_issue(
                        &store,
                        "user",
                        CreateIssueCommand::new(project_id, format!("issue {}", i), IssueType::Task),
                    )
                    .unwrap()
                    .issue_number
            })
        })
        .collect();

    let mut numbers: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
}

#[test]
fn guarded_write_detects_stale_versions() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();
    let done = engine
        .create_column(&store, &project.id, "Done", StatusMapping::Closed)
        .unwrap();
    let issue = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "pg", IssueType::Task),
        )
        .unwrap();

    let moved = engine
        .move_issue(
            &store,
            "user",
            MoveIssueCommand {
                issue_id: issue.id.clone(),
                column_id: done.id.clone(),
                version: 1,
            },
        )
        .unwrap();
    assert_eq!(moved.status, IssueStatus::Closed);
    assert_eq!(moved.version, 2);

    let err = engine
        .update_issue(
            &store,
            "user",
            UpdateIssueCommand {
                issue_id: issue.id.clone(),
                version: 1,
                changes: IssueChanges {
                    title: Some("late".into()),
                    ..IssueChanges::default()
                },
            },
        )
        .unwrap_err();
    assert!(err.is_conflict(), "{:?}", err);
}

#[test]
fn rejected_write_rolls_back_the_counter() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();
    let task = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "task", IssueType::Task),
        )
        .unwrap();

    let mut bad = CreateIssueCommand::new(&project.id, "bad", IssueType::Task);
    bad.epic_id = Some(task.id.clone());
    match engine.create_issue(&store, "user", bad) {
        Err(EngineError::Validation(ValidationReason::EpicIdMustReferenceEpic)) => {}
        other => panic!("unexpected result {:?}", other),
    }

    let next = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "next", IssueType::Task),
        )
        .unwrap();
    assert_eq!(next.issue_number, 2);
}

#[test]
fn duplicate_project_key_is_a_validation_error() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let key = project_key();
    engine.create_project(&store, "owner", &key).unwrap();

    let err = engine.create_project(&store, "owner", &key).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationReason::DuplicateProjectKey(_))
    ));
}

#[test]
fn reorder_and_delete_columns() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();
    let todo = engine
        .create_column(&store, &project.id, "Todo", StatusMapping::Open)
        .unwrap();
    let done = engine
        .create_column(&store, &project.id, "Done", StatusMapping::Closed)
        .unwrap();

    let reordered = engine
        .reorder_columns(&store, &project.id, &[done.id.clone(), todo.id.clone()])
        .unwrap();
    let ids: Vec<&str> = reordered.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, [done.id.as_str(), todo.id.as_str()]);

    let mut command = CreateIssueCommand::new(&project.id, "placed", IssueType::Task);
    command.column_id = Some(todo.id.clone());
    let issue = engine.create_issue(&store, "user", command).unwrap();

    engine.delete_column(&store, &todo.id).unwrap();
    let detached = engine.get_issue(&store, &issue.id).unwrap();
    assert_eq!(detached.column_id, None);
    assert_eq!(detached.version, issue.version + 1);
}

#[test]
fn reparenting_waits_for_a_concurrent_new_subtask() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();
    let middle = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "middle", IssueType::Task),
        )
        .unwrap();
    let top = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "top", IssueType::Feature),
        )
        .unwrap();

    let command = UpdateIssueCommand {
        issue_id: middle.id.clone(),
        version: middle.version,
        changes: IssueChanges {
            issue_type: Some(IssueType::Subtask),
            parent_issue_id: Some(Some(top.id.clone())),
            ..IssueChanges::default()
        },
    };
    let writer_engine = engine.clone();
    let (outcome, child_id) =
        rewrite_while_child_is_added(&pool, &middle, "parent_issue_id", "subtask", move |store| {
            writer_engine.update_issue(store, "user", command)
        });

    match outcome {
        Err(EngineError::Validation(ValidationReason::SubtaskNestingNotAllowed)) => {}
        other => panic!("unexpected result {:?}", other),
    }
    let middle = engine.get_issue(&store, &middle.id).unwrap();
    assert_eq!(middle.parent_issue_id, None);
    let child = engine.get_issue(&store, &child_id).unwrap();
    assert_eq!(child.parent_issue_id.as_deref(), Some(middle.id.as_str()));
}

#[test]
fn retyping_an_epic_waits_for_a_concurrent_new_member() {
    let pool = match pool() {
        Some(pool) => pool,
        None => return,
    };
    let engine = engine();
    let store = pool.checkout().unwrap();
    let project = engine.create_project(&store, "owner", &project_key()).unwrap();
    let epic = engine
        .create_issue(
            &store,
            "user",
            CreateIssueCommand::new(&project.id, "epic", IssueType::Epic),
        )
        .unwrap();

    let command = UpdateIssueCommand {
        issue_id: epic.id.clone(),
        version: epic.version,
        changes: IssueChanges {
            issue_type: Some(IssueType::Task),
            ..IssueChanges::default()
        },
    };
    let writer_engine = engine.clone();
    let (outcome, member_id) =
        rewrite_while_child_is_added(&pool, &epic, "epic_id", "task", move |store| {
            writer_engine.update_issue(store, "user", command)
        });

    match outcome {
        Err(EngineError::Validation(ValidationReason::EpicStillReferenced)) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(
        engine.get_issue(&store, &epic.id).unwrap().issue_type,
        IssueType::Epic
    );
    let member = engine.get_issue(&store, &member_id).unwrap();
    assert_eq!(member.epic_id.as_deref(), Some(epic.id.as_str()));
}

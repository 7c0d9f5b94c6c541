use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tonic::{Request, Status};
use proto::issues::{
    Column as ProtoColumn, Issue as ProtoIssue, Progress as ProtoProgress,
    Project as ProtoProject,
};

use crate::engine::model::{BoardColumn, Issue, Project};
use crate::engine::{
    EngineError, EngineResult, IssueEngine, IssueKey, IssueStore, Progress, StoreProvider,
    ValidationReason,
};

pub mod columns;
pub mod issues;
pub mod projects;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity for mutating calls.
pub fn actor_id<T>(request: &Request<T>) -> Result<String, Status> {
    request
        .metadata()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Status::unauthenticated(format!("{} metadata is required", USER_ID_HEADER)))
}

pub fn to_status(err: EngineError) -> Status {
    match &err {
        EngineError::NotFound { .. } => Status::not_found(err.to_string()),
        EngineError::Forbidden { .. } => Status::permission_denied(err.to_string()),
        EngineError::Validation(reason) => {
            Status::invalid_argument(format!("{}: {}", reason.code(), reason))
        }
        EngineError::Conflict { .. } => Status::aborted(err.to_string()),
        EngineError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            Status::unavailable(err.to_string())
        }
    }
}

/// Runs `f` against a freshly checked out store on the blocking pool.
///
/// Once dispatched, `f` runs to completion even if the caller goes away; its
/// transaction commits or rolls back as a whole and the result is dropped.
pub async fn run_blocking<P, T, F>(provider: &P, f: F) -> Result<T, Status>
where
    P: StoreProvider,
    T: Send + 'static,
    F: FnOnce(&P::Store) -> EngineResult<T> + Send + 'static,
{
    let provider = provider.clone();
    tokio::task::spawn_blocking(move || {
        let store = provider.checkout()?;
        f(&store)
    })
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "engine task failed");
        Status::internal("engine task failed")
    })?
    .map_err(to_status)
}

/// Streams already loaded items the way every search endpoint does.
pub fn stream_items<T>(items: Vec<T>) -> ReceiverStream<Result<T, Status>>
where
    T: Send + 'static,
{
    let mut stream = tokio_stream::iter(items);
    let (sender, receiver) = mpsc::channel(16);

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            if sender.send(Ok(item)).await.is_err() {
                break;
            }
        }
    });

    ReceiverStream::new(receiver)
}

pub fn parse_field<T>(value: &str) -> Result<T, Status>
where
    T: FromStr<Err = ValidationReason>,
{
    value
        .parse()
        .map_err(|reason: ValidationReason| to_status(reason.into()))
}

pub fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, Status>
where
    T: FromStr<Err = ValidationReason>,
{
    value.map(parse_field::<T>).transpose()
}

pub fn timestamp(at: &DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

pub fn proto_project(project: Project) -> ProtoProject {
    ProtoProject {
        created_at: Some(timestamp(&project.created_at)),
        id: project.id,
        key: project.key,
        owner_id: project.owner_id,
    }
}

pub fn proto_column(column: BoardColumn) -> ProtoColumn {
    ProtoColumn {
        status_mapping: column.status_mapping.to_string(),
        id: column.id,
        project_id: column.project_id,
        name: column.name,
        position: column.position,
    }
}

pub fn proto_progress(progress: Progress) -> ProtoProgress {
    ProtoProgress {
        total: i64::try_from(progress.total).unwrap_or(i64::MAX),
        completed: i64::try_from(progress.completed).unwrap_or(i64::MAX),
        ratio: progress.ratio(),
    }
}

pub fn proto_issue(issue: Issue, key: &IssueKey) -> ProtoIssue {
    ProtoIssue {
        key: key.to_string(),
        priority: issue.priority.to_string(),
        issue_type: issue.issue_type.to_string(),
        status: issue.status.to_string(),
        created_at: Some(timestamp(&issue.created_at)),
        updated_at: Some(timestamp(&issue.updated_at)),
        id: issue.id,
        project_id: issue.project_id,
        issue_number: issue.issue_number,
        title: issue.title,
        description: issue.description,
        column_id: issue.column_id,
        parent_issue_id: issue.parent_issue_id,
        epic_id: issue.epic_id,
        assignee_id: issue.assignee_id,
        reporter_id: issue.reporter_id,
        milestone_id: issue.milestone_id,
        version: issue.version,
    }
}

/// Renders issues with their keys, looking each project up once.
pub fn keyed_issues<S: IssueStore>(
    engine: &IssueEngine,
    store: &S,
    issues: Vec<Issue>,
) -> EngineResult<Vec<ProtoIssue>> {
    let mut project_keys: HashMap<String, String> = HashMap::new();
    let mut rendered = Vec::with_capacity(issues.len());
    for issue in issues {
        let project_key = match project_keys.get(&issue.project_id) {
            Some(project_key) => project_key.clone(),
            None => {
                let project = engine.get_project(store, &issue.project_id)?;
                project_keys.insert(project.id, project.key.clone());
                project.key
            }
        };
        let key = IssueKey::new(project_key, issue.issue_number);
        rendered.push(proto_issue(issue, &key));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn actor_comes_from_metadata() {
        let mut request = Request::new(());
        assert_eq!(actor_id(&request).unwrap_err().code(), Code::Unauthenticated);

        request
            .metadata_mut()
            .insert(USER_ID_HEADER, "u1".parse().unwrap());
        assert_eq!(actor_id(&request).unwrap(), "u1");
    }

    #[test]
    fn engine_errors_map_to_distinct_codes() {
        let conflict = EngineError::Conflict {
            issue_id: "i1".into(),
            expected: 3,
        };
        assert_eq!(to_status(conflict).code(), Code::Aborted);

        let status = to_status(ValidationReason::CrossProjectReference.into());
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().starts_with("cross_project_reference"));

        assert_eq!(
            to_status(EngineError::not_found(crate::engine::Entity::Epic, "e1")).code(),
            Code::NotFound
        );
        assert_eq!(
            to_status(EngineError::Storage("down".into())).code(),
            Code::Unavailable
        );
    }

    #[test]
    fn progress_carries_its_ratio() {
        let progress = proto_progress(Progress {
            total: 4,
            completed: 1,
        });
        assert_eq!((progress.total, progress.completed), (4, 1));
        assert!((progress.ratio - 0.25).abs() < f64::EPSILON);

        assert_eq!(proto_progress(Progress::default()).ratio, 0.0);
    }

    #[tokio::test]
    async fn abandoned_call_still_finishes_its_transaction() {
        use std::sync::{mpsc as sync_mpsc, Arc};

        use futures::FutureExt;

        use crate::db::memory::MemoryStore;
        use crate::engine::NoopSink;

        let store = MemoryStore::new();
        let engine = Arc::new(IssueEngine::new(Arc::new(NoopSink)));
        let (started_tx, started_rx) = sync_mpsc::channel();
        let (release_tx, release_rx) = sync_mpsc::channel::<()>();
        let (done_tx, done_rx) = sync_mpsc::channel();

        let call = run_blocking(&store, move |store| {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            let created = engine.create_project(store, "owner", "LEFT");
            done_tx.send(created.is_ok()).unwrap();
            created
        });
        assert!(call.now_or_never().is_none());

        started_rx.recv().unwrap();
        release_tx.send(()).unwrap();
        assert!(done_rx.recv().unwrap());
        assert!(store.find_project_by_key("LEFT").unwrap().is_some());
    }
}

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tonic::{Request, Response, Status};
use proto::issues::{
    issues_service_server::IssuesService, CreateIssueRequest, Issue as ProtoIssue, IssueId,
    IssueKey as ProtoIssueKey, MoveIssueRequest, Progress as ProtoProgress, SearchIssuesParams,
    UpdateIssueRequest,
};

use super::{
    actor_id, keyed_issues, parse_field, parse_optional, proto_issue, proto_progress,
    run_blocking, stream_items,
};
use crate::engine::model::{Issue, IssueChanges, IssueFilter};
use crate::engine::{
    CreateIssueCommand, EngineResult, IssueEngine, IssueStore, MoveIssueCommand, StoreProvider,
    UpdateIssueCommand,
};
use crate::permissions::{authorize, Action, PermissionService};

pub struct IssuesController<P> {
    pub provider: P,
    pub engine: Arc<IssueEngine>,
    pub permissions: Arc<dyn PermissionService>,
}

impl<P> IssuesController<P> {
    fn handles(&self) -> (Arc<IssueEngine>, Arc<dyn PermissionService>) {
        (self.engine.clone(), self.permissions.clone())
    }
}

fn render<S: IssueStore>(engine: &IssueEngine, store: &S, issue: Issue) -> EngineResult<ProtoIssue> {
    let key = engine.issue_key(store, &issue)?;
    Ok(proto_issue(issue, &key))
}

/// Empty string clears a nullable link.
fn link_change(value: Option<String>) -> Option<Option<String>> {
    value.map(|value| if value.is_empty() { None } else { Some(value) })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[tonic::async_trait]
impl<P: StoreProvider> IssuesService for IssuesController<P> {
    async fn get_issue_by_id(
        &self,
        request: Request<IssueId>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let issue_id = request.into_inner().issue_id;
        let engine = self.engine.clone();

        let issue = run_blocking(&self.provider, move |store| {
            let issue = engine.get_issue(store, &issue_id)?;
            render(&engine, store, issue)
        })
        .await?;

        Ok(Response::new(issue))
    }

    async fn get_issue_by_key(
        &self,
        request: Request<ProtoIssueKey>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let key = request.into_inner().key;
        let engine = self.engine.clone();

        let issue = run_blocking(&self.provider, move |store| {
            let issue = engine.get_issue_by_key(store, &key)?;
            render(&engine, store, issue)
        })
        .await?;

        Ok(Response::new(issue))
    }

    type SearchIssuesStream = Pin<Box<dyn Stream<Item = Result<ProtoIssue, Status>> + Send>>;

    async fn search_issues(
        &self,
        request: Request<SearchIssuesParams>,
    ) -> Result<Response<Self::SearchIssuesStream>, Status> {
        let params = request.into_inner();
        let filter = IssueFilter {
            status: parse_optional(params.status.as_deref())?,
            issue_type: parse_optional(params.issue_type.as_deref())?,
            ids: params.issues_ids,
            project_id: params.project_id,
            column_id: params.column_id,
            epic_id: params.epic_id,
            parent_issue_id: params.parent_issue_id,
            assignee_id: params.assignee_id,
            limit: params.limit,
            offset: params.offset,
        };
        let engine = self.engine.clone();

        let found = run_blocking(&self.provider, move |store| {
            let issues = engine.search_issues(store, &filter)?;
            keyed_issues(&engine, store, issues)
        })
        .await?;

        let output_stream = stream_items(found);
        Ok(Response::new(
            Box::pin(output_stream) as Self::SearchIssuesStream
        ))
    }

    async fn create_issue(
        &self,
        request: Request<CreateIssueRequest>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let command = CreateIssueCommand {
            priority: parse_optional(non_empty(data.priority).as_deref())?,
            issue_type: parse_field(&data.issue_type)?,
            status: parse_optional(non_empty(data.status).as_deref())?,
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            column_id: non_empty(data.column_id),
            parent_issue_id: non_empty(data.parent_issue_id),
            epic_id: non_empty(data.epic_id),
            assignee_id: non_empty(data.assignee_id),
            milestone_id: non_empty(data.milestone_id),
        };
        let (engine, permissions) = self.handles();

        let issue = run_blocking(&self.provider, move |store| {
            authorize(permissions.as_ref(), &actor, &command.project_id, Action::CreateIssue)?;
            let issue = engine.create_issue(store, &actor, command)?;
            render(&engine, store, issue)
        })
        .await?;

        Ok(Response::new(issue))
    }

    async fn update_issue(
        &self,
        request: Request<UpdateIssueRequest>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let command = UpdateIssueCommand {
            issue_id: data.issue_id,
            version: data.version,
            changes: IssueChanges {
                title: data.title,
                description: data.description,
                priority: parse_optional(data.priority.as_deref())?,
                issue_type: parse_optional(data.issue_type.as_deref())?,
                status: parse_optional(data.status.as_deref())?,
                column_id: link_change(data.column_id),
                parent_issue_id: link_change(data.parent_issue_id),
                epic_id: link_change(data.epic_id),
                assignee_id: link_change(data.assignee_id),
                milestone_id: link_change(data.milestone_id),
            },
        };
        let (engine, permissions) = self.handles();

        let issue = run_blocking(&self.provider, move |store| {
            let current = engine.get_issue(store, &command.issue_id)?;
            authorize(permissions.as_ref(), &actor, &current.project_id, Action::UpdateIssue)?;
            let issue = engine.update_issue(store, &actor, command)?;
            render(&engine, store, issue)
        })
        .await?;

        Ok(Response::new(issue))
    }

    async fn move_issue(
        &self,
        request: Request<MoveIssueRequest>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let command = MoveIssueCommand {
            issue_id: data.issue_id,
            column_id: data.column_id,
            version: data.version,
        };
        let (engine, permissions) = self.handles();

        let issue = run_blocking(&self.provider, move |store| {
            let current = engine.get_issue(store, &command.issue_id)?;
            authorize(permissions.as_ref(), &actor, &current.project_id, Action::MoveIssue)?;
            let issue = engine.move_issue(store, &actor, command)?;
            render(&engine, store, issue)
        })
        .await?;

        Ok(Response::new(issue))
    }

    async fn delete_issue(
        &self,
        request: Request<IssueId>,
    ) -> Result<Response<ProtoIssue>, Status> {
        let actor = actor_id(&request)?;
        let issue_id = request.into_inner().issue_id;
        let (engine, permissions) = self.handles();

        let issue = run_blocking(&self.provider, move |store| {
            let current = engine.get_issue(store, &issue_id)?;
            authorize(permissions.as_ref(), &actor, &current.project_id, Action::DeleteIssue)?;
            let key = engine.issue_key(store, &current)?;
            let deleted = engine.delete_issue(store, &issue_id)?;
            Ok(proto_issue(deleted, &key))
        })
        .await?;

        Ok(Response::new(issue))
    }

    async fn get_subtask_progress(
        &self,
        request: Request<IssueId>,
    ) -> Result<Response<ProtoProgress>, Status> {
        let issue_id = request.into_inner().issue_id;
        let engine = self.engine.clone();

        let progress = run_blocking(&self.provider, move |store| {
            engine.subtask_progress(store, &issue_id)
        })
        .await?;

        Ok(Response::new(proto_progress(progress)))
    }

    async fn get_epic_progress(
        &self,
        request: Request<IssueId>,
    ) -> Result<Response<ProtoProgress>, Status> {
        let issue_id = request.into_inner().issue_id;
        let engine = self.engine.clone();

        let progress = run_blocking(&self.provider, move |store| {
            engine.epic_progress(store, &issue_id)
        })
        .await?;

        Ok(Response::new(proto_progress(progress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_link_clears_the_field() {
        assert_eq!(link_change(None), None);
        assert_eq!(link_change(Some(String::new())), Some(None));
        assert_eq!(
            link_change(Some("e1".into())),
            Some(Some("e1".to_string()))
        );
    }
}

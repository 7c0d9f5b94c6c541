use std::sync::Arc;

use tonic::{Request, Response, Status};
use proto::issues::{
    projects_service_server::ProjectsService, CreateProjectRequest, Project as ProtoProject,
    ProjectId,
};

use super::{actor_id, proto_project, run_blocking};
use crate::engine::{IssueEngine, StoreProvider};

pub struct ProjectsController<P> {
    pub provider: P,
    pub engine: Arc<IssueEngine>,
}

#[tonic::async_trait]
impl<P: StoreProvider> ProjectsService for ProjectsController<P> {
    async fn get_project_by_id(
        &self,
        request: Request<ProjectId>,
    ) -> Result<Response<ProtoProject>, Status> {
        let project_id = request.into_inner().project_id;
        let engine = self.engine.clone();

        let project = run_blocking(&self.provider, move |store| {
            engine.get_project(store, &project_id)
        })
        .await?;

        Ok(Response::new(proto_project(project)))
    }

    async fn create_project(
        &self,
        request: Request<CreateProjectRequest>,
    ) -> Result<Response<ProtoProject>, Status> {
        let owner_id = actor_id(&request)?;
        let key = request.into_inner().key;
        let engine = self.engine.clone();

        let project = run_blocking(&self.provider, move |store| {
            engine.create_project(store, &owner_id, &key)
        })
        .await?;

        Ok(Response::new(proto_project(project)))
    }
}

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tonic::{Request, Response, Status};
use proto::issues::{
    columns_service_server::ColumnsService, Column as ProtoColumn, ColumnId,
    CreateColumnRequest, ReorderColumnsRequest, SearchColumnsParams, UpdateColumnRequest,
};

use super::{actor_id, parse_field, parse_optional, proto_column, run_blocking, stream_items};
use crate::engine::model::{ColumnChanges, StatusMapping};
use crate::engine::{EngineError, Entity, IssueEngine, IssueStore, StoreProvider};
use crate::permissions::{authorize, Action, PermissionService};

pub struct ColumnsController<P> {
    pub provider: P,
    pub engine: Arc<IssueEngine>,
    pub permissions: Arc<dyn PermissionService>,
}

impl<P> ColumnsController<P> {
    fn handles(&self) -> (Arc<IssueEngine>, Arc<dyn PermissionService>) {
        (self.engine.clone(), self.permissions.clone())
    }
}

fn column_project<S: IssueStore>(store: &S, column_id: &str) -> Result<String, EngineError> {
    store
        .find_column(column_id)?
        .map(|column| column.project_id)
        .ok_or_else(|| EngineError::not_found(Entity::Column, column_id))
}

type ColumnStream = Pin<Box<dyn Stream<Item = Result<ProtoColumn, Status>> + Send>>;

#[tonic::async_trait]
impl<P: StoreProvider> ColumnsService for ColumnsController<P> {
    async fn get_column_by_id(
        &self,
        request: Request<ColumnId>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let column_id = request.into_inner().column_id;
        let engine = self.engine.clone();

        let column = run_blocking(&self.provider, move |store| {
            engine.get_column(store, &column_id)
        })
        .await?;

        Ok(Response::new(proto_column(column)))
    }

    type SearchColumnsStream = ColumnStream;

    async fn search_columns(
        &self,
        request: Request<SearchColumnsParams>,
    ) -> Result<Response<Self::SearchColumnsStream>, Status> {
        let params = request.into_inner();
        let engine = self.engine.clone();

        let found = run_blocking(&self.provider, move |store| {
            engine.search_columns(store, &params.columns_ids, params.project_id.as_deref())
        })
        .await?;

        let output_stream = stream_items(found.into_iter().map(proto_column).collect());
        Ok(Response::new(
            Box::pin(output_stream) as Self::SearchColumnsStream
        ))
    }

    async fn create_column(
        &self,
        request: Request<CreateColumnRequest>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let status_mapping: StatusMapping = if data.status_mapping.is_empty() {
            StatusMapping::default()
        } else {
            parse_field(&data.status_mapping)?
        };
        let (engine, permissions) = self.handles();

        let column = run_blocking(&self.provider, move |store| {
            authorize(permissions.as_ref(), &actor, &data.project_id, Action::ManageColumns)?;
            engine.create_column(store, &data.project_id, &data.name, status_mapping)
        })
        .await?;

        Ok(Response::new(proto_column(column)))
    }

    async fn update_column(
        &self,
        request: Request<UpdateColumnRequest>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let changes = ColumnChanges {
            name: data.name,
            status_mapping: parse_optional(data.status_mapping.as_deref())?,
        };
        let column_id = data.column_id;
        let (engine, permissions) = self.handles();

        let column = run_blocking(&self.provider, move |store| {
            let project_id = column_project(store, &column_id)?;
            authorize(permissions.as_ref(), &actor, &project_id, Action::ManageColumns)?;
            engine.update_column(store, &column_id, &changes)
        })
        .await?;

        Ok(Response::new(proto_column(column)))
    }

    type ReorderColumnsStream = ColumnStream;

    async fn reorder_columns(
        &self,
        request: Request<ReorderColumnsRequest>,
    ) -> Result<Response<Self::ReorderColumnsStream>, Status> {
        let actor = actor_id(&request)?;
        let data = request.into_inner();
        let (engine, permissions) = self.handles();

        let reordered = run_blocking(&self.provider, move |store| {
            authorize(permissions.as_ref(), &actor, &data.project_id, Action::ManageColumns)?;
            engine.reorder_columns(store, &data.project_id, &data.columns_ids)
        })
        .await?;

        let output_stream = stream_items(reordered.into_iter().map(proto_column).collect());
        Ok(Response::new(
            Box::pin(output_stream) as Self::ReorderColumnsStream
        ))
    }

    async fn delete_column(
        &self,
        request: Request<ColumnId>,
    ) -> Result<Response<ProtoColumn>, Status> {
        let actor = actor_id(&request)?;
        let column_id = request.into_inner().column_id;
        let (engine, permissions) = self.handles();

        let column = run_blocking(&self.provider, move |store| {
            let project_id = column_project(store, &column_id)?;
            authorize(permissions.as_ref(), &actor, &project_id, Action::ManageColumns)?;
            engine.delete_column(store, &column_id)
        })
        .await?;

        Ok(Response::new(proto_column(column)))
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use proto::issues::{
    columns_service_server::ColumnsServiceServer, issues_service_server::IssuesServiceServer,
    projects_service_server::ProjectsServiceServer,
};

use issue_tracker::{
    config::Config,
    controllers::{
        columns::ColumnsController, issues::IssuesController, projects::ProjectsController,
    },
    db::{connection::init_pool, memory::MemoryStore},
    engine::{IssueEngine, StoreProvider, TransitionSink},
    events::{EventBusSink, LogSink},
    permissions::{AllowAll, PermissionService},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,issue_tracker=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let sink: Arc<dyn TransitionSink> = match config.eventbus_url.clone() {
        Some(url) => {
            tracing::info!(%url, "publishing transitions to the event bus");
            Arc::new(EventBusSink::connect(url).await?)
        }
        None => Arc::new(LogSink),
    };
    let engine = Arc::new(IssueEngine::new(sink));
    let permissions: Arc<dyn PermissionService> = Arc::new(AllowAll);

    match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = init_pool(database_url, config.pool_size)?;
            serve(config.app_url, pool, engine, permissions).await
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, issues are kept in memory only");
            serve(config.app_url, MemoryStore::new(), engine, permissions).await
        }
    }
}

async fn serve<P: StoreProvider>(
    app_url: SocketAddr,
    provider: P,
    engine: Arc<IssueEngine>,
    permissions: Arc<dyn PermissionService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let projects_controller = ProjectsController {
        provider: provider.clone(),
        engine: engine.clone(),
    };
    let columns_controller = ColumnsController {
        provider: provider.clone(),
        engine: engine.clone(),
        permissions: permissions.clone(),
    };
    let issues_controller = IssuesController {
        provider,
        engine,
        permissions,
    };

    tracing::info!(%app_url, "issue tracker listening");
    Server::builder()
        .add_service(ProjectsServiceServer::new(projects_controller))
        .add_service(ColumnsServiceServer::new(columns_controller))
        .add_service(IssuesServiceServer::new(issues_controller))
        .serve(app_url)
        .await?;

    Ok(())
}

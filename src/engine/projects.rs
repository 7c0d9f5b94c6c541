use uuid::Uuid;

use super::error::{EngineError, EngineResult, Entity, ValidationReason};
use super::issues::IssueEngine;
use super::model::{NewProject, Project};
use super::sequence::validate_project_key;
use super::store::IssueStore;

impl IssueEngine {
    /// Registers a project owned by `owner_id`. The key never changes after this.
    pub fn create_project<S: IssueStore>(
        &self,
        store: &S,
        owner_id: &str,
        key: &str,
    ) -> EngineResult<Project> {
        validate_project_key(key)?;

        let project = store.transaction(|tx| {
            if tx.find_project_by_key(key)?.is_some() {
                return Err(ValidationReason::DuplicateProjectKey(key.to_string()).into());
            }
            tx.insert_project(&NewProject {
                id: Uuid::new_v4().to_string(),
                key: key.to_string(),
                owner_id: owner_id.to_string(),
            })
        })?;

        tracing::info!(project_id = %project.id, key = %project.key, "project created");
        Ok(project)
    }

    pub fn get_project<S: IssueStore>(&self, store: &S, project_id: &str) -> EngineResult<Project> {
        store
            .find_project(project_id)?
            .ok_or_else(|| EngineError::not_found(Entity::Project, project_id))
    }
}

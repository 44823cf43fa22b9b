//! # Application Repository
//!
//! CRUD over the cluster-scoped Application custom resource.

use crate::crd::Application;
use crate::error::AppError;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::info;

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(&self, application: &Application) -> Result<Application, AppError>;

    /// Read-modify-write of the agent-owned fields. `NotFound` when the
    /// Application disappeared.
    async fn update(&self, application: &Application) -> Result<Application, AppError>;

    async fn delete(&self, name: &str) -> Result<(), AppError>;

    async fn get(&self, name: &str) -> Result<Application, AppError>;

    async fn list(&self) -> Result<Vec<Application>, AppError>;
}

/// Copy the fields this agent owns from `desired` onto `current`.
///
/// Exactly `description`, `labels`, `services` and `compassMetadata` are
/// copied. Anything else on the live object (status, other controllers'
/// metadata, `skipInstallation`) is left untouched. New agent-owned spec
/// fields must be added here.
#[must_use]
pub fn merge_managed_fields(mut current: Application, desired: &Application) -> Application {
    current.spec.description.clone_from(&desired.spec.description);
    current.spec.labels.clone_from(&desired.spec.labels);
    current.spec.services.clone_from(&desired.spec.services);
    current
        .spec
        .compass_metadata
        .clone_from(&desired.spec.compass_metadata);
    current
}

#[derive(Clone)]
pub struct KubeApplicationRepository {
    api: Api<Application>,
}

impl std::fmt::Debug for KubeApplicationRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeApplicationRepository")
            .finish_non_exhaustive()
    }
}

impl KubeApplicationRepository {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

fn name_of(application: &Application) -> Result<&str, AppError> {
    application
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| AppError::internal("application has no name"))
}

#[async_trait]
impl ApplicationRepository for KubeApplicationRepository {
    async fn create(&self, application: &Application) -> Result<Application, AppError> {
        let name = name_of(application)?;
        let created = self
            .api
            .create(&PostParams::default(), application)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to create application {name}")))?;

        info!("Created application {name}");
        Ok(created)
    }

    async fn update(&self, application: &Application) -> Result<Application, AppError> {
        let name = name_of(application)?;
        let current = self
            .api
            .get(name)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to get application {name}")))?;

        let merged = merge_managed_fields(current, application);
        let updated = self
            .api
            .replace(name, &PostParams::default(), &merged)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to update application {name}")))?;

        info!("Updated application {name}");
        Ok(updated)
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.api
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to delete application {name}")))?;

        info!("Deleted application {name}");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Application, AppError> {
        self.api
            .get(name)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to get application {name}")))
    }

    async fn list(&self) -> Result<Vec<Application>, AppError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| AppError::from_kube(&e, "Failed to list applications"))?;
        Ok(list.items)
    }
}

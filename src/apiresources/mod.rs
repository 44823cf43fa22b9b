//! # API Resources
//!
//! Per-service side effects of a reconciliation: the access service, the
//! credentials secret, the Istio access objects and the asset store
//! documentation.
//!
//! The four steps run in a fixed order and are independent. A failure in one
//! step is recorded and the remaining steps still run; the caller receives
//! one error listing every failure.

pub mod accessservice;
pub mod assetstore;
pub mod istio;

use crate::error::{AppError, ErrorAccumulator};
use crate::model::Credentials;
use crate::naming::NameResolver;
use crate::secrets::CredentialsService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub use accessservice::KubeAccessServiceManager;
pub use assetstore::{Asset, AssetStore, AssetType, RafterAssetStore};
pub use istio::KubeIstioService;

/// Kubernetes Service routing to the application gateway
#[async_trait]
pub trait AccessServiceManager: Send + Sync {
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        service_name: &str,
    ) -> Result<(), AppError>;

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        service_name: &str,
    ) -> Result<(), AppError>;

    async fn delete(&self, service_name: &str) -> Result<(), AppError>;
}

/// Istio objects denying access to a service from unlabelled workloads
#[async_trait]
pub trait IstioService: Send + Sync {
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        resource_name: &str,
    ) -> Result<(), AppError>;

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        resource_name: &str,
    ) -> Result<(), AppError>;

    async fn delete(&self, resource_name: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct ApiResourcesService {
    access_service: Arc<dyn AccessServiceManager>,
    credentials: CredentialsService,
    istio: Arc<dyn IstioService>,
    assets: Arc<dyn AssetStore>,
    names: NameResolver,
}

impl std::fmt::Debug for ApiResourcesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResourcesService")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ApiResourcesService {
    pub fn new(
        access_service: Arc<dyn AccessServiceManager>,
        credentials: CredentialsService,
        istio: Arc<dyn IstioService>,
        assets: Arc<dyn AssetStore>,
        names: NameResolver,
    ) -> Self {
        Self {
            access_service,
            credentials,
            istio,
            assets,
            names,
        }
    }

    pub async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        credentials: Option<&Credentials>,
        assets: &[Asset],
    ) -> Result<(), AppError> {
        let resource_name = self.names.resource_name(application, service_id);
        let mut errors = ErrorAccumulator::new();

        errors.record(
            self.access_service
                .create(application, app_uid, service_id, &resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to create access service {resource_name}"))),
        );

        if credentials.is_some() {
            errors.record(
                self.credentials
                    .create(application, app_uid, service_id, credentials)
                    .await
                    .map_err(|e| e.append(format!("Failed to create credentials for service {service_id}"))),
            );
        }

        errors.record(
            self.istio
                .create(application, app_uid, service_id, &resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to create Istio resources {resource_name}"))),
        );

        if !assets.is_empty() {
            errors.record(
                self.assets
                    .put(service_id, assets)
                    .await
                    .map_err(|e| e.append(format!("Failed to upload specifications for service {service_id}"))),
            );
        }

        finish(errors, application, service_id)
    }

    /// Like `create`, but converges existing objects. Credentials that
    /// disappeared delete the secret; missing assets delete the asset group.
    pub async fn update(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        credentials: Option<&Credentials>,
        assets: &[Asset],
    ) -> Result<(), AppError> {
        let resource_name = self.names.resource_name(application, service_id);
        let mut errors = ErrorAccumulator::new();

        errors.record(
            self.access_service
                .upsert(application, app_uid, service_id, &resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to update access service {resource_name}"))),
        );

        if credentials.is_some() {
            errors.record(
                self.credentials
                    .upsert(application, app_uid, service_id, credentials)
                    .await
                    .map_err(|e| e.append(format!("Failed to update credentials for service {service_id}"))),
            );
        } else {
            let secret_name = self.names.credentials_secret_name(application, service_id);
            errors.record(
                self.credentials
                    .delete(&secret_name)
                    .await
                    .map_err(|e| e.append(format!("Failed to delete credentials secret {secret_name}"))),
            );
        }

        errors.record(
            self.istio
                .upsert(application, app_uid, service_id, &resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to update Istio resources {resource_name}"))),
        );

        let asset_result = if assets.is_empty() {
            self.assets.delete(service_id).await
        } else {
            self.assets.put(service_id, assets).await
        };
        errors.record(
            asset_result
                .map_err(|e| e.append(format!("Failed to update specifications for service {service_id}"))),
        );

        finish(errors, application, service_id)
    }

    /// Remove everything created for `service_id`. `secret_name` is the
    /// credentials secret recorded on the Application, if any.
    pub async fn delete(
        &self,
        application: &str,
        service_id: &str,
        secret_name: Option<&str>,
    ) -> Result<(), AppError> {
        let resource_name = self.names.resource_name(application, service_id);
        let mut errors = ErrorAccumulator::new();

        errors.record(
            self.access_service
                .delete(&resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to delete access service {resource_name}"))),
        );

        if let Some(secret_name) = secret_name.filter(|name| !name.is_empty()) {
            errors.record(
                self.credentials
                    .delete(secret_name)
                    .await
                    .map_err(|e| e.append(format!("Failed to delete credentials secret {secret_name}"))),
            );
        }

        errors.record(
            self.istio
                .delete(&resource_name)
                .await
                .map_err(|e| e.append(format!("Failed to delete Istio resources {resource_name}"))),
        );

        errors.record(
            self.assets
                .delete(service_id)
                .await
                .map_err(|e| e.append(format!("Failed to delete specifications for service {service_id}"))),
        );

        finish(errors, application, service_id)
    }
}

fn finish(errors: ErrorAccumulator, application: &str, service_id: &str) -> Result<(), AppError> {
    errors.into_result().inspect_err(|e| {
        warn!("API resources of service {service_id} in application {application} partially failed: {e}");
    })
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Records `(operation, name)` for access service and Istio calls
    #[derive(Debug, Default)]
    pub(crate) struct RecordingManager {
        pub(crate) calls: Mutex<Vec<(String, String)>>,
        pub(crate) fail: bool,
    }

    impl RecordingManager {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, operation: &str, name: &str) -> Result<(), AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), name.to_string()));
            if self.fail {
                Err(AppError::internal(format!("{operation} {name} failed")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AccessServiceManager for RecordingManager {
        async fn create(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
            self.record("create", name)
        }

        async fn upsert(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
            self.record("upsert", name)
        }

        async fn delete(&self, name: &str) -> Result<(), AppError> {
            self.record("delete", name)
        }
    }

    #[async_trait]
    impl IstioService for RecordingManager {
        async fn create(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
            self.record("create", name)
        }

        async fn upsert(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
            self.record("upsert", name)
        }

        async fn delete(&self, name: &str) -> Result<(), AppError> {
            self.record("delete", name)
        }
    }

    #[async_trait]
    impl AssetStore for RecordingManager {
        async fn put(&self, id: &str, _assets: &[Asset]) -> Result<(), AppError> {
            self.record("put", id)
        }

        async fn delete(&self, id: &str) -> Result<(), AppError> {
            self.record("delete", id)
        }
    }
}

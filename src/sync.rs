//! # Reconciliation
//!
//! One pass of Director applications against the Application CRs owned by
//! this agent. Applications missing in the cluster are created, those no
//! longer in the Director are deleted and the rest are updated.
//!
//! Only CRs carrying `compassMetadata` are considered; anything else in the
//! cluster belongs to someone else.

use crate::apiresources::accessservice::KubeAccessServiceManager;
use crate::apiresources::assetstore::{bundle_assets, RafterAssetStore};
use crate::apiresources::istio::KubeIstioService;
use crate::apiresources::ApiResourcesService;
use crate::applications::{ApplicationRepository, Converter, KubeApplicationRepository};
use crate::config::AgentConfig;
use crate::crd;
use crate::error::{AppError, ErrorAccumulator};
use crate::model;
use crate::naming::NameResolver;
use crate::secrets::{CredentialsService, KubeSecretRepository, RequestParametersService};
use kube::Client;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Outcome of reconciling one application
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub application_name: String,
    pub application_id: String,
    pub operation: Operation,
    pub error: Option<AppError>,
}

impl SyncResult {
    fn new(name: &str, id: &str, operation: Operation, error: Option<AppError>) -> Self {
        Self {
            application_name: name.to_string(),
            application_id: id.to_string(),
            operation,
            error,
        }
    }
}

#[derive(Clone)]
pub struct SyncService {
    applications: Arc<dyn ApplicationRepository>,
    converter: Converter,
    resources: ApiResourcesService,
    credentials: CredentialsService,
    parameters: RequestParametersService,
}

impl fmt::Debug for SyncService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncService")
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

fn uid_of(application: &crd::Application) -> Result<String, AppError> {
    application
        .metadata
        .uid
        .clone()
        .ok_or_else(|| AppError::internal("application has no uid"))
}

fn name_of(application: &crd::Application) -> &str {
    application.metadata.name.as_deref().unwrap_or_default()
}

fn application_id(application: &crd::Application) -> &str {
    application
        .spec
        .compass_metadata
        .as_ref()
        .map_or("", |metadata| metadata.application_id.as_str())
}

/// Credentials secret names referenced by the entries of `application`
fn credentials_secret_names(application: &crd::Application) -> BTreeSet<String> {
    entries(application)
        .map(|entry| entry.credentials.secret_name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

fn request_parameters_secret_names(application: &crd::Application) -> BTreeSet<String> {
    entries(application)
        .map(|entry| entry.request_parameters_secret_name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

fn entries(application: &crd::Application) -> impl Iterator<Item = &crd::Entry> {
    application
        .spec
        .services
        .iter()
        .flat_map(|service| service.entries.iter())
}

impl SyncService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        converter: Converter,
        resources: ApiResourcesService,
        credentials: CredentialsService,
        parameters: RequestParametersService,
    ) -> Self {
        Self {
            applications,
            converter,
            resources,
            credentials,
            parameters,
        }
    }

    /// Wire every collaborator against the cluster `client` talks to
    pub fn for_cluster(client: Client, config: &AgentConfig) -> Result<Self, AppError> {
        let names = NameResolver::new(config.namespace.as_str());
        let secrets = Arc::new(KubeSecretRepository::new(client.clone(), &config.namespace));
        let credentials = CredentialsService::new(secrets.clone(), names.clone());
        let parameters = RequestParametersService::new(secrets, names.clone());

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build upload client: {e}")))?;
        let resources = ApiResourcesService::new(
            Arc::new(KubeAccessServiceManager::new(
                client.clone(),
                &config.namespace,
                config.gateway_port,
            )),
            credentials.clone(),
            Arc::new(KubeIstioService::new(client.clone(), &config.namespace)),
            Arc::new(RafterAssetStore::new(
                client.clone(),
                http,
                config.upload_service_url.as_str(),
            )),
            names.clone(),
        );

        Ok(Self::new(
            Arc::new(KubeApplicationRepository::new(client)),
            Converter::new(
                names,
                config.central_gateway_url.as_str(),
                config.skip_apps_tls_verify,
            ),
            resources,
            credentials,
            parameters,
        ))
    }

    /// Reconcile the cluster against `director_applications`.
    ///
    /// Fails only when the current Applications cannot be listed; per
    /// application failures are reported in the results.
    pub async fn apply(
        &self,
        director_applications: &[model::Application],
    ) -> Result<Vec<SyncResult>, AppError> {
        info!("Applications passed to sync: {}", director_applications.len());

        let runtime_applications: Vec<crd::Application> = self
            .applications
            .list()
            .await
            .map_err(|e| e.append("Failed to get application list"))?
            .into_iter()
            .filter(|application| application.spec.compass_metadata.is_some())
            .collect();

        let in_runtime = |name: &str| {
            runtime_applications
                .iter()
                .find(|application| name_of(application) == name)
        };

        let mut results = Vec::with_capacity(director_applications.len() + runtime_applications.len());

        for director in director_applications {
            if in_runtime(&director.name).is_none() {
                results.push(self.create_application(director).await);
            }
        }

        for runtime in &runtime_applications {
            let name = name_of(runtime);
            if !director_applications.iter().any(|director| director.name == name) {
                results.push(self.delete_application(runtime).await);
            }
        }

        for director in director_applications {
            if let Some(existing) = in_runtime(&director.name) {
                results.push(self.update_application(director, existing).await);
            }
        }

        Ok(results)
    }

    /// Create the CR, then its API resources, definition credentials and
    /// request parameters. Stops at the first failing phase.
    async fn create_application(&self, director: &model::Application) -> SyncResult {
        let name = director.name.as_str();
        let result = |error| SyncResult::new(name, &director.id, Operation::Create, error);

        info!("Creating application '{name}'");
        let created = match self.applications.create(&self.converter.convert(director)).await {
            Ok(created) => created,
            Err(e) => {
                warn!("Failed to create application '{name}': {e}");
                return result(Some(e));
            }
        };
        let app_uid = match uid_of(&created) {
            Ok(uid) => uid,
            Err(e) => return result(Some(e)),
        };

        let outcome = async {
            self.create_api_resources(director, &app_uid)
                .await
                .map_err(|e| e.append("Failed to create API resources"))?;
            self.upsert_definition_credentials(director, &app_uid)
                .await
                .map_err(|e| e.append("Failed to create definition credentials"))?;
            self.upsert_request_parameters(director, &app_uid)
                .await
                .map_err(|e| e.append("Failed to create request parameters secrets"))
        }
        .await;
        if let Err(e) = outcome {
            warn!("Failed to create resources of application '{name}': {e}");
            return result(Some(e));
        }

        result(None)
    }

    async fn create_api_resources(&self, director: &model::Application, app_uid: &str) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        for bundle in &director.api_bundles {
            errors.record(
                self.resources
                    .create(
                        &director.name,
                        app_uid,
                        &bundle.id,
                        bundle.default_credentials(),
                        &bundle_assets(bundle),
                    )
                    .await,
            );
        }
        errors.into_result()
    }

    async fn update_application(
        &self,
        director: &model::Application,
        existing: &crd::Application,
    ) -> SyncResult {
        let name = director.name.as_str();
        let result = |error| SyncResult::new(name, &director.id, Operation::Update, error);

        info!("Updating application '{name}'");
        let updated = match self.applications.update(&self.converter.convert(director)).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Failed to update application '{name}': {e}");
                return result(Some(e));
            }
        };
        let app_uid = match uid_of(&updated) {
            Ok(uid) => uid,
            Err(e) => return result(Some(e)),
        };

        let mut errors = ErrorAccumulator::new();

        for bundle in &director.api_bundles {
            errors.record(
                self.resources
                    .update(
                        name,
                        &app_uid,
                        &bundle.id,
                        bundle.default_credentials(),
                        &bundle_assets(bundle),
                    )
                    .await,
            );
        }
        for service in &existing.spec.services {
            if director.bundle(&service.id).is_none() {
                info!("Deleting resources of service '{}' in application '{name}'", service.id);
                let secret = self.credentials.secret_name(name, &service.id);
                errors.record(self.resources.delete(name, &service.id, Some(&secret)).await);
            }
        }

        // Bundle secrets stay while the bundle still supplies default credentials,
        // even when no entry references them any more
        let mut kept_credentials = credentials_secret_names(&updated);
        kept_credentials.extend(
            director
                .api_bundles
                .iter()
                .filter(|bundle| bundle.default_credentials().is_some())
                .map(|bundle| self.credentials.secret_name(name, &bundle.id)),
        );
        let stale_credentials = credentials_secret_names(existing)
            .into_iter()
            .filter(|secret| !kept_credentials.contains(secret));
        for secret in stale_credentials {
            info!("Deleting credentials secret '{secret}' of application '{name}'");
            errors.record(self.credentials.delete(&secret).await);
        }
        errors.record(self.upsert_definition_credentials(director, &app_uid).await);

        let stale_parameters = request_parameters_secret_names(existing)
            .into_iter()
            .filter(|secret| !request_parameters_secret_names(&updated).contains(secret));
        for secret in stale_parameters {
            info!("Deleting request parameters secret '{secret}' of application '{name}'");
            errors.record(self.parameters.delete(&secret).await);
        }
        errors.record(self.upsert_request_parameters(director, &app_uid).await);

        let error = errors.into_error();
        if let Some(e) = &error {
            warn!("Failed to update resources of application '{name}': {e}");
        }
        result(error)
    }

    async fn delete_application(&self, runtime: &crd::Application) -> SyncResult {
        let name = name_of(runtime);
        let mut errors = ErrorAccumulator::new();

        info!("Deleting request parameters secrets of application '{name}'");
        for secret in request_parameters_secret_names(runtime) {
            errors.record(self.parameters.delete(&secret).await);
        }

        info!("Deleting credentials secrets of application '{name}'");
        for secret in credentials_secret_names(runtime) {
            errors.record(self.credentials.delete(&secret).await);
        }

        info!("Deleting API resources of application '{name}'");
        for service in &runtime.spec.services {
            // Bundle credentials of event-only services are not referenced by any entry
            let secret = self.credentials.secret_name(name, &service.id);
            errors.record(self.resources.delete(name, &service.id, Some(&secret)).await);
        }

        info!("Deleting application '{name}'");
        errors.record(self.applications.delete(name).await);

        let error = errors.into_error();
        if let Some(e) = &error {
            warn!("Failed to delete application '{name}': {e}");
        }
        SyncResult::new(name, application_id(runtime), Operation::Delete, error)
    }

    /// Secrets for credentials set directly on API definitions
    async fn upsert_definition_credentials(
        &self,
        director: &model::Application,
        app_uid: &str,
    ) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        let definitions = director
            .api_bundles
            .iter()
            .flat_map(|bundle| bundle.api_definitions.iter());
        for api in definitions {
            if let Some(credentials) = &api.credentials {
                errors.record(
                    self.credentials
                        .upsert(&director.name, app_uid, &api.id, Some(credentials))
                        .await,
                );
            }
        }
        errors.into_result()
    }

    async fn upsert_request_parameters(
        &self,
        director: &model::Application,
        app_uid: &str,
    ) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        for bundle in &director.api_bundles {
            errors.record(
                self.parameters
                    .upsert(&director.name, app_uid, &bundle.id, bundle.request_parameters())
                    .await,
            );
        }
        errors.into_result()
    }
}

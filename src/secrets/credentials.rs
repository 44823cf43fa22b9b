//! # Credentials Service
//!
//! Stores one service's credentials as a secret and hands back the
//! [`AppCredentials`] pointer that goes on the Application CR.

use crate::crd::AppCredentials;
use crate::error::AppError;
use crate::model::Credentials;
use crate::naming::NameResolver;
use crate::observability::metrics;
use crate::secrets::repository::SecretRepository;
use crate::secrets::strategy::CredentialStrategy;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct CredentialsService {
    repository: Arc<dyn SecretRepository>,
    names: NameResolver,
}

impl std::fmt::Debug for CredentialsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsService")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Secret contents and pointer computed for one set of credentials
struct Prepared {
    name: String,
    strategy: CredentialStrategy,
    data: crate::secrets::strategy::SecretData,
    info: AppCredentials,
}

impl CredentialsService {
    pub fn new(repository: Arc<dyn SecretRepository>, names: NameResolver) -> Self {
        Self { repository, names }
    }

    /// Name of the secret holding the credentials of `(application, service_id)`
    #[must_use]
    pub fn secret_name(&self, application: &str, service_id: &str) -> String {
        self.names.credentials_secret_name(application, service_id)
    }

    fn prepare(
        &self,
        application: &str,
        service_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Option<Prepared>, AppError> {
        let Some(credentials) = credentials else {
            return Ok(None);
        };

        let strategy = CredentialStrategy::for_credentials(credentials);
        if !strategy.credentials_provided(credentials) {
            return Ok(None);
        }

        let name = self.names.credentials_secret_name(application, service_id);
        let data = strategy
            .create_secret_data(credentials)
            .map_err(|e| e.append("Failed to create secret data"))?;
        let info = strategy.to_credentials_info(credentials, &name);

        Ok(Some(Prepared {
            name,
            strategy,
            data,
            info,
        }))
    }

    /// Create the credentials secret for `service_id`.
    ///
    /// Missing or incomplete credentials produce an empty pointer and no
    /// secret. An existing secret is reported as `AlreadyExists`.
    pub async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<AppCredentials, AppError> {
        let Some(prepared) = self.prepare(application, service_id, credentials)? else {
            return Ok(AppCredentials::default());
        };

        self.repository
            .create(application, app_uid, &prepared.name, service_id, &prepared.data)
            .await?;
        metrics::increment_secret_writes("create");

        Ok(prepared.info)
    }

    /// Create or update the credentials secret, skipping the write when the
    /// stored content already matches
    pub async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        credentials: Option<&Credentials>,
    ) -> Result<AppCredentials, AppError> {
        let Some(prepared) = self.prepare(application, service_id, credentials)? else {
            return Ok(AppCredentials::default());
        };

        match self.repository.get(&prepared.name).await {
            Err(e) if e.is_not_found() => {
                self.repository
                    .create(application, app_uid, &prepared.name, service_id, &prepared.data)
                    .await?;
                metrics::increment_secret_writes("create");
            }
            Err(e) => return Err(e),
            Ok(current) => {
                if prepared.strategy.should_update(&current, &prepared.data) {
                    self.repository
                        .upsert(application, app_uid, &prepared.name, service_id, &prepared.data)
                        .await?;
                    metrics::increment_secret_writes("update");
                } else {
                    debug!("Secret {} unchanged, skipping update", prepared.name);
                    metrics::increment_secret_writes_skipped();
                }
            }
        }

        Ok(prepared.info)
    }

    /// Read back the credentials a pointer refers to
    pub async fn get(&self, app_credentials: &AppCredentials) -> Result<Credentials, AppError> {
        let strategy = CredentialStrategy::for_app_credentials(app_credentials)
            .map_err(|e| e.append("Failed to initialize strategy"))?;

        let data = self.repository.get(&app_credentials.secret_name).await?;
        strategy.to_credentials(&data, app_credentials)
    }

    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.repository.delete(name).await
    }
}

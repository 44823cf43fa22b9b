//! # Secret Repository
//!
//! CRUD over opaque key/value secrets in the integration namespace.

use crate::constants::FIELD_MANAGER;
use crate::crd::{owner_reference, service_labels};
use crate::error::AppError;
use crate::secrets::strategy::SecretData;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::{debug, info};

#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Fails with `AlreadyExists` when a secret named `name` exists
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        name: &str,
        service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError>;

    /// Fails with `NotFound` when the secret does not exist
    async fn get(&self, name: &str) -> Result<SecretData, AppError>;

    /// Deleting a missing secret succeeds
    async fn delete(&self, name: &str) -> Result<(), AppError>;

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        name: &str,
        service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError>;
}

/// Secret repository backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretRepository {
    api: Api<Secret>,
}

impl std::fmt::Debug for KubeSecretRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretRepository").finish_non_exhaustive()
    }
}

impl KubeSecretRepository {
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

fn build_secret(
    application: &str,
    app_uid: &str,
    name: &str,
    service_id: &str,
    data: &SecretData,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(service_labels(application, service_id)),
            owner_references: Some(vec![owner_reference(application, app_uid)]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            data.iter()
                .map(|(key, value)| (key.clone(), ByteString(value.clone())))
                .collect(),
        ),
        ..Default::default()
    }
}

#[async_trait]
impl SecretRepository for KubeSecretRepository {
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        name: &str,
        service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError> {
        let secret = build_secret(application, app_uid, name, service_id, data);
        self.api
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to create secret {name}")))?;

        info!("Created secret {name} for application {application}");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<SecretData, AppError> {
        let secret = self
            .api
            .get(name)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to get secret {name}")))?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted secret {name}");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("Secret {name} already absent");
                Ok(())
            }
            Err(e) => Err(AppError::from_kube(
                &e,
                &format!("Failed to delete secret {name}"),
            )),
        }
    }

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        name: &str,
        service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError> {
        let secret = build_secret(application, app_uid, name, service_id, data);
        self.api
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&secret),
            )
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to upsert secret {name}")))?;

        info!("Upserted secret {name} for application {application}");
        Ok(())
    }
}


/// In-memory repository recording every call, shared by the service tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Create(String),
        Get(String),
        Delete(String),
        Upsert(String),
    }

    #[derive(Debug, Default)]
    pub(crate) struct InMemorySecretRepository {
        pub(crate) secrets: Mutex<BTreeMap<String, SecretData>>,
        pub(crate) calls: Mutex<Vec<Call>>,
        pub(crate) fail_writes: bool,
    }

    impl InMemorySecretRepository {
        pub(crate) fn with_secret(name: &str, data: SecretData) -> Self {
            let repo = Self::default();
            repo.secrets.lock().unwrap().insert(name.to_string(), data);
            repo
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn stored(&self, name: &str) -> Option<SecretData> {
            self.secrets.lock().unwrap().get(name).cloned()
        }
    }

    #[async_trait]
    impl SecretRepository for InMemorySecretRepository {
        async fn create(
            &self,
            _application: &str,
            _app_uid: &str,
            name: &str,
            _service_id: &str,
            data: &SecretData,
        ) -> Result<(), AppError> {
            self.calls.lock().unwrap().push(Call::Create(name.to_string()));
            if self.fail_writes {
                return Err(AppError::internal("create failed"));
            }
            let mut secrets = self.secrets.lock().unwrap();
            if secrets.contains_key(name) {
                return Err(AppError::already_exists(format!("secret {name} exists")));
            }
            secrets.insert(name.to_string(), data.clone());
            Ok(())
        }

        async fn get(&self, name: &str) -> Result<SecretData, AppError> {
            self.calls.lock().unwrap().push(Call::Get(name.to_string()));
            self.secrets
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("secret {name} not found")))
        }

        async fn delete(&self, name: &str) -> Result<(), AppError> {
            self.calls.lock().unwrap().push(Call::Delete(name.to_string()));
            if self.fail_writes {
                return Err(AppError::internal("delete failed"));
            }
            self.secrets.lock().unwrap().remove(name);
            Ok(())
        }

        async fn upsert(
            &self,
            _application: &str,
            _app_uid: &str,
            name: &str,
            _service_id: &str,
            data: &SecretData,
        ) -> Result<(), AppError> {
            self.calls.lock().unwrap().push(Call::Upsert(name.to_string()));
            if self.fail_writes {
                return Err(AppError::internal("upsert failed"));
            }
            self.secrets
                .lock()
                .unwrap()
                .insert(name.to_string(), data.clone());
            Ok(())
        }
    }
}

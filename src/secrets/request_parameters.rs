//! # Request Parameters Service
//!
//! Stores extra headers and query parameters the gateway adds to calls
//! towards an application. Values are JSON-encoded under the `headers` and
//! `queryParameters` keys.

use crate::error::AppError;
use crate::model::{ParameterMap, RequestParameters};
use crate::naming::NameResolver;
use crate::observability::metrics;
use crate::secrets::repository::SecretRepository;
use crate::secrets::strategy::SecretData;
use std::sync::Arc;
use tracing::debug;

pub const HEADERS_KEY: &str = "headers";
pub const QUERY_PARAMETERS_KEY: &str = "queryParameters";

#[derive(Clone)]
pub struct RequestParametersService {
    repository: Arc<dyn SecretRepository>,
    names: NameResolver,
}

impl std::fmt::Debug for RequestParametersService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestParametersService")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl RequestParametersService {
    pub fn new(repository: Arc<dyn SecretRepository>, names: NameResolver) -> Self {
        Self { repository, names }
    }

    /// Create the request parameters secret. Returns its name, or an empty
    /// name when there is nothing to store.
    pub async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        parameters: Option<&RequestParameters>,
    ) -> Result<String, AppError> {
        let Some(parameters) = parameters.filter(|p| !p.is_empty()) else {
            return Ok(String::new());
        };

        let name = self.names.request_parameters_secret_name(application, service_id);
        let data = encode(parameters).map_err(|e| e.append("Failed to create secret data"))?;

        self.repository
            .create(application, app_uid, &name, service_id, &data)
            .await?;
        metrics::increment_secret_writes("create");

        Ok(name)
    }

    /// Create or update the request parameters secret; unchanged content is
    /// not rewritten
    pub async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        parameters: Option<&RequestParameters>,
    ) -> Result<String, AppError> {
        let Some(parameters) = parameters.filter(|p| !p.is_empty()) else {
            return Ok(String::new());
        };

        let name = self.names.request_parameters_secret_name(application, service_id);
        let data = encode(parameters).map_err(|e| e.append("Failed to create secret data"))?;

        match self.repository.get(&name).await {
            Err(e) if e.is_not_found() => {
                self.repository
                    .create(application, app_uid, &name, service_id, &data)
                    .await?;
                metrics::increment_secret_writes("create");
            }
            Err(e) => return Err(e),
            Ok(current) if current == data => {
                debug!("Secret {name} unchanged, skipping update");
                metrics::increment_secret_writes_skipped();
            }
            Ok(_) => {
                self.repository
                    .upsert(application, app_uid, &name, service_id, &data)
                    .await?;
                metrics::increment_secret_writes("update");
            }
        }

        Ok(name)
    }

    pub async fn get(&self, name: &str) -> Result<RequestParameters, AppError> {
        let data = self.repository.get(name).await?;
        decode(&data)
    }

    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.repository.delete(name).await
    }
}

fn encode(parameters: &RequestParameters) -> Result<SecretData, AppError> {
    let mut data = SecretData::new();
    if let Some(headers) = &parameters.headers {
        data.insert(HEADERS_KEY.to_string(), to_json(headers)?);
    }
    if let Some(query) = &parameters.query_parameters {
        data.insert(QUERY_PARAMETERS_KEY.to_string(), to_json(query)?);
    }
    Ok(data)
}

fn to_json(map: &ParameterMap) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec(map).map_err(|e| AppError::internal(format!("failed to encode parameters: {e}")))
}

fn decode(data: &SecretData) -> Result<RequestParameters, AppError> {
    let read = |key: &str| -> Result<Option<ParameterMap>, AppError> {
        data.get(key)
            .map(|bytes| {
                serde_json::from_slice(bytes).map_err(|e| {
                    AppError::internal(format!("failed to decode '{key}' parameters: {e}"))
                })
            })
            .transpose()
    };

    Ok(RequestParameters {
        headers: read(HEADERS_KEY)?,
        query_parameters: read(QUERY_PARAMETERS_KEY)?,
    })
}

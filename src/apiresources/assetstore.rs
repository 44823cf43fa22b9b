//! # Asset Store
//!
//! API and event specifications published through Rafter. Each document is
//! uploaded to the upload service, then a `ClusterAssetGroup` named by the
//! service id points at the uploaded files.
//!
//! The group carries a hash of the uploaded content. When the hash matches
//! nothing is uploaded or written.

use crate::error::AppError;
use crate::model::{ApiBundle, ApiSpecType, EventApiSpecType, SpecFormat};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

const RAFTER_GROUP: &str = "rafter.kyma-project.io";
const RAFTER_VERSION: &str = "v1beta1";

/// Annotation holding the content hash of an asset group
pub const ASSET_GROUP_HASH_ANNOTATION: &str = "compass.kyma-project.io/content-hash";

const VIEW_CONTEXT_LABEL: &str = "rafter.kyma-project.io/view-context";
const GROUP_NAME_LABEL: &str = "rafter.kyma-project.io/group-name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    OpenApi,
    OData,
    AsyncApi,
}

impl AssetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenApi => "openapi",
            Self::OData => "odata",
            Self::AsyncApi => "asyncapi",
        }
    }
}

impl From<ApiSpecType> for AssetType {
    fn from(spec_type: ApiSpecType) -> Self {
        match spec_type {
            ApiSpecType::OpenApi => Self::OpenApi,
            ApiSpecType::OData => Self::OData,
        }
    }
}

impl From<EventApiSpecType> for AssetType {
    fn from(spec_type: EventApiSpecType) -> Self {
        match spec_type {
            EventApiSpecType::AsyncApi => Self::AsyncApi,
        }
    }
}

fn extension(format: SpecFormat) -> &'static str {
    match format {
        SpecFormat::Json => "json",
        SpecFormat::Yaml => "yaml",
        SpecFormat::Xml => "xml",
    }
}

/// One specification document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Definition id
    pub id: String,
    pub name: String,
    pub asset_type: AssetType,
    pub format: SpecFormat,
    pub content: Vec<u8>,
}

impl Asset {
    fn file_name(&self) -> String {
        format!("{}.{}", self.id, extension(self.format))
    }
}

/// Every non-empty specification of a bundle's definitions
#[must_use]
pub fn bundle_assets(bundle: &ApiBundle) -> Vec<Asset> {
    let apis = bundle.api_definitions.iter().filter_map(|api| {
        let spec = api.spec.as_ref()?;
        let data = spec.data.as_deref().filter(|d| !d.is_empty())?;
        Some(Asset {
            id: api.id.clone(),
            name: api.name.clone(),
            asset_type: spec.spec_type.into(),
            format: spec.format,
            content: data.as_bytes().to_vec(),
        })
    });
    let events = bundle.event_definitions.iter().filter_map(|event| {
        let spec = event.spec.as_ref()?;
        let data = spec.data.as_deref().filter(|d| !d.is_empty())?;
        Some(Asset {
            id: event.id.clone(),
            name: event.name.clone(),
            asset_type: spec.spec_type.into(),
            format: spec.format,
            content: data.as_bytes().to_vec(),
        })
    });
    apis.chain(events).collect()
}

/// Hex sha256 over every asset, independent of asset order
#[must_use]
pub fn content_hash(assets: &[Asset]) -> String {
    let mut sorted: Vec<&Asset> = assets.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for asset in sorted {
        hasher.update(asset.id.as_bytes());
        hasher.update(asset.asset_type.as_str().as_bytes());
        hasher.update(extension(asset.format).as_bytes());
        hasher.update((asset.content.len() as u64).to_be_bytes());
        hasher.update(&asset.content);
    }
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Publish `assets` under `id`, replacing whatever was there
    async fn put(&self, id: &str, assets: &[Asset]) -> Result<(), AppError>;

    /// Deleting a missing group succeeds
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    uploaded_files: Vec<UploadedFile>,
    #[serde(default)]
    errors: Vec<UploadError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    file_name: String,
    remote_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadError {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    message: String,
}

/// Rafter backed asset store
#[derive(Clone)]
pub struct RafterAssetStore {
    http: reqwest::Client,
    upload_url: String,
    groups: Api<DynamicObject>,
    resource: ApiResource,
}

impl std::fmt::Debug for RafterAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RafterAssetStore")
            .field("upload_url", &self.upload_url)
            .finish_non_exhaustive()
    }
}

impl RafterAssetStore {
    #[must_use]
    pub fn new(client: Client, http: reqwest::Client, upload_url: impl Into<String>) -> Self {
        let resource = ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(RAFTER_GROUP, RAFTER_VERSION, "ClusterAssetGroup"),
            "clusterassetgroups",
        );
        Self {
            http,
            upload_url: upload_url.into(),
            groups: Api::all_with(client, &resource),
            resource,
        }
    }

    async fn current_hash(&self, id: &str) -> Result<Option<String>, AppError> {
        let group = self
            .groups
            .get_opt(id)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to get asset group {id}")))?;
        Ok(group.and_then(|group| {
            group
                .metadata
                .annotations
                .and_then(|mut annotations| annotations.remove(ASSET_GROUP_HASH_ANNOTATION))
        }))
    }

    /// Upload one document, returning its remote URL
    async fn upload(&self, directory: &str, asset: &Asset) -> Result<String, AppError> {
        let file_name = asset.file_name();
        let part = reqwest::multipart::Part::bytes(asset.content.clone()).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("directory", directory.to_string())
            .part("public", part);

        let response = self
            .http
            .post(format!("{}/v1/upload", self.upload_url.trim_end_matches('/')))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::internal(format!("Failed to upload {file_name}: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::internal(format!("Upload service rejected {file_name}: {e}")))?
            .json::<UploadResponse>()
            .await
            .map_err(|e| AppError::internal(format!("Invalid upload response for {file_name}: {e}")))?;

        if let Some(err) = response.errors.first() {
            return Err(AppError::internal(format!(
                "Failed to upload {}: {}",
                err.file_name, err.message
            )));
        }

        response
            .uploaded_files
            .into_iter()
            .find(|file| file.file_name == file_name)
            .map(|file| file.remote_path)
            .ok_or_else(|| AppError::internal(format!("Upload service did not return {file_name}")))
    }
}

/// ClusterAssetGroup pointing at uploaded documents. `sources` pairs each
/// asset with its remote URL.
fn asset_group(
    resource: &ApiResource,
    id: &str,
    sources: &[(&Asset, String)],
    hash: &str,
) -> DynamicObject {
    let sources: Vec<serde_json::Value> = sources
        .iter()
        .map(|(asset, url)| {
            json!({
                "name": format!("{}-{}", asset.asset_type.as_str(), asset.id),
                "type": asset.asset_type.as_str(),
                "mode": "single",
                "url": url,
            })
        })
        .collect();

    let mut group = DynamicObject::new(id, resource).data(json!({
        "spec": {
            "displayName": id,
            "description": format!("Specifications of service {id}"),
            "sources": sources,
        }
    }));
    group.metadata.labels = Some(BTreeMap::from([
        (VIEW_CONTEXT_LABEL.to_string(), "service-catalog".to_string()),
        (GROUP_NAME_LABEL.to_string(), "compass".to_string()),
    ]));
    group.metadata.annotations = Some(BTreeMap::from([(
        ASSET_GROUP_HASH_ANNOTATION.to_string(),
        hash.to_string(),
    )]));
    group
}

#[async_trait]
impl AssetStore for RafterAssetStore {
    async fn put(&self, id: &str, assets: &[Asset]) -> Result<(), AppError> {
        let hash = content_hash(assets);
        if self.current_hash(id).await?.as_deref() == Some(hash.as_str()) {
            debug!("Asset group {id} unchanged, skipping upload");
            return Ok(());
        }

        let mut sources = Vec::with_capacity(assets.len());
        for asset in assets {
            let url = self.upload(id, asset).await?;
            sources.push((asset, url));
        }

        let group = asset_group(&self.resource, id, &sources, &hash);
        self.groups
            .patch(
                id,
                &PatchParams::apply(crate::constants::FIELD_MANAGER).force(),
                &Patch::Apply(&group),
            )
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to upsert asset group {id}")))?;

        info!("Published {} specification(s) for service {id}", assets.len());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        match self.groups.delete(id, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted asset group {id}");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(AppError::from_kube(
                &e,
                &format!("Failed to delete asset group {id}"),
            )),
        }
    }
}

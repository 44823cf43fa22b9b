//! # Access Service
//!
//! A `Service` per application service, named by the resource name and routed
//! to the application's gateway deployment.

use crate::apiresources::AccessServiceManager;
use crate::constants::{FIELD_MANAGER, LABEL_APPLICATION};
use crate::crd::{owner_reference, service_labels};
use crate::error::AppError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

const PORT_NAME: &str = "http-gateway";
const EXTERNAL_PORT: i32 = 80;

#[derive(Clone)]
pub struct KubeAccessServiceManager {
    api: Api<Service>,
    gateway_port: i32,
}

impl std::fmt::Debug for KubeAccessServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeAccessServiceManager")
            .field("gateway_port", &self.gateway_port)
            .finish_non_exhaustive()
    }
}

impl KubeAccessServiceManager {
    #[must_use]
    pub fn new(client: Client, namespace: &str, gateway_port: i32) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            gateway_port,
        }
    }
}

fn build_service(
    application: &str,
    app_uid: &str,
    service_id: &str,
    service_name: &str,
    gateway_port: i32,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(service_name.to_string()),
            labels: Some(service_labels(application, service_id)),
            owner_references: Some(vec![owner_reference(application, app_uid)]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                LABEL_APPLICATION.to_string(),
                format!("{application}-application-gateway"),
            )])),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port: EXTERNAL_PORT,
                target_port: Some(IntOrString::Int(gateway_port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl AccessServiceManager for KubeAccessServiceManager {
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        service_name: &str,
    ) -> Result<(), AppError> {
        let service = build_service(application, app_uid, service_id, service_name, self.gateway_port);
        match self.api.create(&PostParams::default(), &service).await {
            Ok(_) => {
                info!("Created access service {service_name}");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!("Access service {service_name} already exists");
                Ok(())
            }
            Err(e) => Err(AppError::from_kube(
                &e,
                &format!("Failed to create access service {service_name}"),
            )),
        }
    }

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        service_name: &str,
    ) -> Result<(), AppError> {
        let service = build_service(application, app_uid, service_id, service_name, self.gateway_port);
        self.api
            .patch(
                service_name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&service),
            )
            .await
            .map_err(|e| {
                AppError::from_kube(&e, &format!("Failed to upsert access service {service_name}"))
            })?;
        Ok(())
    }

    async fn delete(&self, service_name: &str) -> Result<(), AppError> {
        match self.api.delete(service_name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted access service {service_name}");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(AppError::from_kube(
                &e,
                &format!("Failed to delete access service {service_name}"),
            )),
        }
    }
}

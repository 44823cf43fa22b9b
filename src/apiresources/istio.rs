//! # Istio Access Objects
//!
//! Three `config.istio.io/v1alpha2` objects per service, all named by the
//! resource name: a `denier` handler, a `checknothing` instance and a rule
//! that denies calls to the access service from workloads not labelled with
//! the resource name.

use crate::apiresources::IstioService;
use crate::constants::FIELD_MANAGER;
use crate::crd::{owner_reference, service_labels};
use crate::error::{AppError, ErrorAccumulator};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::{debug, info};

const ISTIO_GROUP: &str = "config.istio.io";
const ISTIO_VERSION: &str = "v1alpha2";

/// gRPC `PERMISSION_DENIED`
const DENIER_STATUS_CODE: i32 = 7;
const DENIER_STATUS_MESSAGE: &str = "Not allowed";

fn istio_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(ISTIO_GROUP, ISTIO_VERSION, kind), plural)
}

#[derive(Clone)]
pub struct KubeIstioService {
    namespace: String,
    handlers: (Api<DynamicObject>, ApiResource),
    instances: (Api<DynamicObject>, ApiResource),
    rules: (Api<DynamicObject>, ApiResource),
}

impl std::fmt::Debug for KubeIstioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeIstioService")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeIstioService {
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        let api = |resource: ApiResource| {
            (
                Api::namespaced_with(client.clone(), namespace, &resource),
                resource,
            )
        };
        Self {
            namespace: namespace.to_string(),
            handlers: api(istio_resource("Handler", "handlers")),
            instances: api(istio_resource("Instance", "instances")),
            rules: api(istio_resource("Rule", "rules")),
        }
    }

    fn objects(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        resource_name: &str,
    ) -> [(&Api<DynamicObject>, DynamicObject); 3] {
        let meta = |resource: &ApiResource, spec: serde_json::Value| {
            build_object(resource, &self.namespace, application, app_uid, service_id, resource_name, spec)
        };
        [
            (&self.handlers.0, meta(&self.handlers.1, handler_spec())),
            (&self.instances.0, meta(&self.instances.1, instance_spec())),
            (
                &self.rules.0,
                meta(&self.rules.1, rule_spec(resource_name, &self.namespace)),
            ),
        ]
    }
}

fn build_object(
    resource: &ApiResource,
    namespace: &str,
    application: &str,
    app_uid: &str,
    service_id: &str,
    resource_name: &str,
    spec: serde_json::Value,
) -> DynamicObject {
    let mut object = DynamicObject::new(resource_name, resource)
        .within(namespace)
        .data(json!({ "spec": spec }));
    object.metadata.labels = Some(service_labels(application, service_id));
    object.metadata.owner_references = Some(vec![owner_reference(application, app_uid)]);
    object
}

fn handler_spec() -> serde_json::Value {
    json!({
        "compiledAdapter": "denier",
        "params": {
            "status": {
                "code": DENIER_STATUS_CODE,
                "message": DENIER_STATUS_MESSAGE,
            }
        }
    })
}

fn instance_spec() -> serde_json::Value {
    json!({ "compiledTemplate": "checknothing" })
}

fn rule_spec(resource_name: &str, namespace: &str) -> serde_json::Value {
    json!({
        "match": format!(
            r#"(destination.service.host == "{resource_name}.{namespace}.svc.cluster.local") && (source.labels["{resource_name}"] != "true")"#
        ),
        "actions": [{
            "handler": resource_name,
            "instances": [resource_name],
        }]
    })
}

fn kind_of(object: &DynamicObject) -> &str {
    object.types.as_ref().map_or("object", |types| types.kind.as_str())
}

#[async_trait]
impl IstioService for KubeIstioService {
    async fn create(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        resource_name: &str,
    ) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        for (api, object) in self.objects(application, app_uid, service_id, resource_name) {
            let kind = kind_of(&object).to_string();
            match api.create(&PostParams::default(), &object).await {
                Ok(_) => info!("Created Istio {kind} {resource_name}"),
                Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                    debug!("Istio {kind} {resource_name} already exists");
                }
                Err(e) => errors.push(AppError::from_kube(
                    &e,
                    &format!("Failed to create Istio {kind} {resource_name}"),
                )),
            }
        }
        errors.into_result()
    }

    async fn upsert(
        &self,
        application: &str,
        app_uid: &str,
        service_id: &str,
        resource_name: &str,
    ) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        let params = PatchParams::apply(FIELD_MANAGER).force();
        for (api, object) in self.objects(application, app_uid, service_id, resource_name) {
            let kind = kind_of(&object).to_string();
            errors.record(
                api.patch(resource_name, &params, &Patch::Apply(&object))
                    .await
                    .map_err(|e| {
                        AppError::from_kube(&e, &format!("Failed to upsert Istio {kind} {resource_name}"))
                    }),
            );
        }
        errors.into_result()
    }

    async fn delete(&self, resource_name: &str) -> Result<(), AppError> {
        let mut errors = ErrorAccumulator::new();
        for (api, resource) in [&self.handlers, &self.instances, &self.rules] {
            match api.delete(resource_name, &DeleteParams::default()).await {
                Ok(_) => info!("Deleted Istio {} {resource_name}", resource.kind),
                Err(kube::Error::Api(api_err)) if api_err.code == 404 => {}
                Err(e) => errors.push(AppError::from_kube(
                    &e,
                    &format!("Failed to delete Istio {} {resource_name}", resource.kind),
                )),
            }
        }
        errors.into_result()
    }
}

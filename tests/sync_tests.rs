//! # Synchronization Tests
//!
//! Drives several reconciliation cycles against in-memory collaborators and
//! checks the resulting cluster state.

mod common;

use common::{Applications, Objects, Secrets};
use runtime_agent::apiresources::ApiResourcesService;
use runtime_agent::applications::Converter;
use runtime_agent::crd;
use runtime_agent::model::Application;
use runtime_agent::naming::NameResolver;
use runtime_agent::secrets::{CredentialsService, RequestParametersService};
use runtime_agent::sync::{Operation, SyncService};
use serde_json::json;
use std::sync::Arc;

struct Cluster {
    applications: Arc<Applications>,
    secrets: Arc<Secrets>,
    access: Arc<Objects>,
    istio: Arc<Objects>,
    assets: Arc<Objects>,
}

impl Cluster {
    fn new() -> Self {
        Self {
            applications: Arc::new(Applications::default()),
            secrets: Arc::new(Secrets::default()),
            access: Arc::new(Objects::default()),
            istio: Arc::new(Objects::default()),
            assets: Arc::new(Objects::default()),
        }
    }

    fn sync_service(&self) -> SyncService {
        let names = NameResolver::new("kyma-integration");
        let credentials = CredentialsService::new(self.secrets.clone(), names.clone());
        let parameters = RequestParametersService::new(self.secrets.clone(), names.clone());
        let resources = ApiResourcesService::new(
            self.access.clone(),
            credentials.clone(),
            self.istio.clone(),
            self.assets.clone(),
            names.clone(),
        );
        SyncService::new(
            self.applications.clone(),
            Converter::new(names, "http://central-gateway", false),
            resources,
            credentials,
            parameters,
        )
    }
}

fn shop_with_two_bundles() -> Application {
    serde_json::from_value(json!({
        "id": "shop-id",
        "name": "shop",
        "providerDisplayName": "Provider",
        "description": "Online shop",
        "labels": {"scenarios": ["DEFAULT", "SHOP"]},
        "systemAuthIDs": ["auth1"],
        "apiBundles": [
            {
                "id": "b1",
                "name": "Orders",
                "apiDefinitions": [{
                    "id": "orders-api",
                    "name": "Orders API",
                    "targetUrl": "https://shop.example.com/orders",
                    "spec": {"data": "openapi: 3.0.0", "type": "OPEN_API", "format": "YAML"}
                }],
                "defaultInstanceAuth": {
                    "credentials": {"basic": {"username": "admin", "password": "nimda"}},
                    "requestParameters": {"headers": {"X-Tenant": ["t1"]}}
                }
            },
            {
                "id": "b2",
                "name": "Events",
                "eventDefinitions": [{"id": "order-created", "name": "Order created"}]
            }
        ]
    }))
    .unwrap()
}

fn shop_with_second_bundle_only() -> Application {
    serde_json::from_value(json!({
        "id": "shop-id",
        "name": "shop",
        "apiBundles": [{
            "id": "b2",
            "name": "Events",
            "eventDefinitions": [{"id": "order-created", "name": "Order created"}],
            "defaultInstanceAuth": {
                "credentials": {
                    "oauth": {"url": "https://oauth.example.com", "clientId": "id", "clientSecret": "secret"}
                }
            }
        }]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_full_lifecycle_of_an_application() {
    let cluster = Cluster::new();
    let service = cluster.sync_service();

    // First cycle creates everything
    let results = service.apply(&[shop_with_two_bundles()]).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].operation, Operation::Create);
    assert!(results[0].error.is_none(), "{:?}", results[0].error);

    let application = cluster.applications.get_stored("shop").unwrap();
    assert_eq!(application.spec.description, "Online shop");
    assert_eq!(application.spec.labels["scenarios"], "DEFAULT,SHOP");
    assert_eq!(application.spec.labels["connected-app"], "shop");
    assert_eq!(application.spec.services.len(), 2);
    assert_eq!(
        application.spec.compass_metadata.as_ref().unwrap().authentication.client_ids,
        vec!["auth1".to_string()]
    );

    assert_eq!(
        cluster.secrets.names(),
        vec!["params-shop-b1".to_string(), "shop-b1".to_string()]
    );
    assert_eq!(cluster.access.names(), vec!["shop-b1".to_string(), "shop-b2".to_string()]);
    assert_eq!(cluster.istio.names(), vec!["shop-b1".to_string(), "shop-b2".to_string()]);
    assert_eq!(cluster.assets.size_of("b1"), Some(1));
    assert_eq!(cluster.assets.size_of("b2"), None);

    // Second cycle drops b1 and moves credentials to b2
    let results = service.apply(&[shop_with_second_bundle_only()]).await.unwrap();
    assert_eq!(results[0].operation, Operation::Update);
    assert!(results[0].error.is_none(), "{:?}", results[0].error);

    let application = cluster.applications.get_stored("shop").unwrap();
    assert_eq!(application.spec.services.len(), 1);
    assert_eq!(application.spec.services[0].id, "b2");
    assert_eq!(cluster.secrets.names(), vec!["shop-b2".to_string()]);
    assert_eq!(cluster.access.names(), vec!["shop-b2".to_string()]);
    assert_eq!(cluster.istio.names(), vec!["shop-b2".to_string()]);
    assert!(cluster.assets.names().is_empty());

    // Third cycle removes the application
    let results = service.apply(&[]).await.unwrap();
    assert_eq!(results[0].operation, Operation::Delete);
    assert_eq!(results[0].application_id, "shop-id");
    assert!(results[0].error.is_none(), "{:?}", results[0].error);

    assert!(cluster.applications.names().is_empty());
    assert!(cluster.secrets.names().is_empty());
    assert!(cluster.access.names().is_empty());
    assert!(cluster.istio.names().is_empty());
}

#[tokio::test]
async fn test_applications_without_compass_metadata_are_left_alone() {
    let cluster = Cluster::new();
    let manual = crd::Application::new("manual", crd::ApplicationSpec::default());
    cluster
        .applications
        .stored
        .lock()
        .unwrap()
        .insert("manual".to_string(), manual);

    let results = cluster.sync_service().apply(&[]).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(cluster.applications.names(), vec!["manual".to_string()]);
}

#[tokio::test]
async fn test_repeated_cycles_are_stable() {
    let cluster = Cluster::new();
    let service = cluster.sync_service();

    service.apply(&[shop_with_two_bundles()]).await.unwrap();
    let before = cluster.applications.get_stored("shop").unwrap();
    let results = service.apply(&[shop_with_two_bundles()]).await.unwrap();
    let after = cluster.applications.get_stored("shop").unwrap();

    assert!(results[0].error.is_none(), "{:?}", results[0].error);
    assert_eq!(before.spec, after.spec);
    assert_eq!(
        cluster.secrets.names(),
        vec!["params-shop-b1".to_string(), "shop-b1".to_string()]
    );
}

//! # Application Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Application Custom Resource Definition
///
/// One synchronized Director application. Created and owned by the agent when
/// `compassMetadata` is set; applications without it are left alone.
///
/// # Example
///
/// ```yaml
/// apiVersion: applicationconnector.kyma-project.io/v1alpha1
/// kind: Application
/// metadata:
///   name: ec-default
///   labels:
///     app.kubernetes.io/managed-by: compass-runtime-agent
/// spec:
///   description: Commerce backend
///   labels:
///     connected-app: ec-default
///   compassMetadata:
///     applicationId: 0b4a4c8e-1f3e-4a7b-9a57-2e0f7b3c6c55
///     authentication:
///       clientIds: ["auth1"]
///   services: []
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Application",
    group = "applicationconnector.kyma-project.io",
    version = "v1alpha1",
    shortname = "app",
    derive = "PartialEq",
    derive = "Default",
    printcolumn = r#"{"name":"Application ID", "type":"string", "jsonPath":".spec.compassMetadata.applicationId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skip_installation: bool,
    /// Disable TLS verification when the gateway calls the application
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub services: Vec<crate::crd::Service>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compass_metadata: Option<CompassMetadata>,
}

/// Link back to the Director application
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompassMetadata {
    pub application_id: String,
    #[serde(default)]
    pub authentication: Authentication,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    #[serde(default)]
    pub client_ids: Vec<String>,
}

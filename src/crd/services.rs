//! # Application Services
//!
//! A service is one API bundle; its entries are the bundle's API and event
//! definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Bundle id
    pub id: String,
    #[serde(default)]
    pub identifier: String,
    /// Slugged, hash-suffixed bundle name
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_create_parameter_schema: Option<String>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Definition id
    pub id: String,
    pub name: String,
    /// `API` or `Events`
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub central_gateway_url: String,
    #[serde(default)]
    pub credentials: AppCredentials,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_parameters_secret_name: String,
}

/// Pointer to a credentials secret. Never carries secret values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppCredentials {
    /// `OAuth`, `Basic`, or empty when the entry has no credentials
    #[serde(rename = "type", default)]
    pub credentials_type: String,
    #[serde(default)]
    pub secret_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authentication_url: String,
    #[serde(default, rename = "csrfInfo", skip_serializing_if = "Option::is_none")]
    pub csrf_info: Option<CsrfInfo>,
}

impl AppCredentials {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials_type.is_empty() && self.secret_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsrfInfo {
    #[serde(rename = "tokenEndpointURL")]
    pub token_endpoint_url: String,
}

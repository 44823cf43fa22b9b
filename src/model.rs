//! # Director Model
//!
//! Application metadata as fetched from the Director. Recomputed in full on
//! every reconciliation cycle; nothing here is cached.

use crate::error::AppError;
use crate::secrets::strategy::CredentialStrategy;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Application labels. Values are strings or lists of strings; other shapes
/// are tolerated on input and dropped during conversion.
pub type Labels = BTreeMap<String, serde_json::Value>;

/// Header or query parameter name to values
pub type ParameterMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub id: String,
    /// Kubernetes name of the Application CR
    pub name: String,
    pub provider_display_name: String,
    pub description: String,
    pub labels: Labels,
    #[serde(rename = "systemAuthIDs")]
    pub system_auth_ids: Vec<String>,
    pub api_bundles: Vec<ApiBundle>,
}

impl Application {
    #[must_use]
    pub fn bundle(&self, id: &str) -> Option<&ApiBundle> {
        self.api_bundles.iter().find(|bundle| bundle.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiBundle {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON schema for instance auth request input
    pub instance_auth_request_input_schema: Option<String>,
    pub api_definitions: Vec<ApiDefinition>,
    pub event_definitions: Vec<EventApiDefinition>,
    pub default_instance_auth: Option<Auth>,
}

impl ApiBundle {
    /// Whether any definition carries a specification document
    #[must_use]
    pub fn contains_any_specs(&self) -> bool {
        self.api_definitions.iter().any(|api| api.spec.is_some())
            || self.event_definitions.iter().any(|event| event.spec.is_some())
    }

    #[must_use]
    pub fn default_credentials(&self) -> Option<&Credentials> {
        self.default_instance_auth
            .as_ref()
            .and_then(|auth| auth.credentials.as_ref())
    }

    #[must_use]
    pub fn request_parameters(&self) -> Option<&RequestParameters> {
        self.default_instance_auth
            .as_ref()
            .and_then(|auth| auth.request_parameters.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target_url: String,
    /// Overrides the bundle's default credentials for this definition
    #[serde(deserialize_with = "credentials_or_none")]
    pub credentials: Option<Credentials>,
    pub spec: Option<ApiSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventApiDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "credentials_or_none")]
    pub credentials: Option<Credentials>,
    pub spec: Option<EventApiSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ApiSpecType {
    #[serde(rename = "OPEN_API")]
    OpenApi,
    #[serde(rename = "ODATA")]
    OData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EventApiSpecType {
    #[serde(rename = "ASYNC_API")]
    AsyncApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpecFormat {
    Json,
    Yaml,
    Xml,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: ApiSpecType,
    pub format: SpecFormat,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventApiSpec {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub spec_type: EventApiSpecType,
    pub format: SpecFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Auth {
    #[serde(deserialize_with = "credentials_or_none")]
    pub credentials: Option<Credentials>,
    pub request_parameters: Option<RequestParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfInfo {
    #[serde(rename = "tokenEndpointURL")]
    pub token_endpoint_url: String,
}

/// Exactly one credential kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKind {
    Basic(BasicAuth),
    OAuth(OAuth),
}

/// Validated credentials. Construct from a [`CredentialsInput`]; inputs with
/// both or neither credential kind are rejected with `WrongInput`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "CredentialsInput", into = "CredentialsInput")]
pub struct Credentials {
    pub kind: CredentialKind,
    pub csrf_info: Option<CsrfInfo>,
}

impl Credentials {
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::Basic(BasicAuth {
                username: username.into(),
                password: password.into(),
            }),
            csrf_info: None,
        }
    }

    #[must_use]
    pub fn oauth(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            kind: CredentialKind::OAuth(OAuth {
                url: url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            }),
            csrf_info: None,
        }
    }

    #[must_use]
    pub fn with_csrf(mut self, token_endpoint_url: impl Into<String>) -> Self {
        self.csrf_info = Some(CsrfInfo {
            token_endpoint_url: token_endpoint_url.into(),
        });
        self
    }
}

/// Credentials carrying neither kind decode as absent, so the owning bundle or
/// definition is reconciled without credentials. Both kinds at once is still
/// rejected and fails the whole payload.
fn credentials_or_none<'de, D>(deserializer: D) -> Result<Option<Credentials>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<CredentialsInput>::deserialize(deserializer)? {
        Some(input) if input.basic.is_some() || input.oauth.is_some() => Credentials::try_from(input)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Wire shape of credentials: both kinds optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialsInput {
    pub basic: Option<BasicAuth>,
    pub oauth: Option<OAuth>,
    #[serde(rename = "csrfInfo")]
    pub csrf_info: Option<CsrfInfo>,
}

impl TryFrom<CredentialsInput> for Credentials {
    type Error = AppError;

    fn try_from(input: CredentialsInput) -> Result<Self, Self::Error> {
        let missing = || AppError::wrong_input("credentials are missing");
        let kind = match CredentialStrategy::from_input(&input)? {
            CredentialStrategy::Basic => CredentialKind::Basic(input.basic.ok_or_else(missing)?),
            CredentialStrategy::OAuth => CredentialKind::OAuth(input.oauth.ok_or_else(missing)?),
        };

        Ok(Self {
            kind,
            csrf_info: input.csrf_info,
        })
    }
}

impl From<Credentials> for CredentialsInput {
    fn from(credentials: Credentials) -> Self {
        let (basic, oauth) = match credentials.kind {
            CredentialKind::Basic(basic) => (Some(basic), None),
            CredentialKind::OAuth(oauth) => (None, Some(oauth)),
        };
        Self {
            basic,
            oauth,
            csrf_info: credentials.csrf_info,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestParameters {
    pub headers: Option<ParameterMap>,
    pub query_parameters: Option<ParameterMap>,
}

impl RequestParameters {
    /// True when neither headers nor query parameters carry anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.as_ref().is_none_or(BTreeMap::is_empty)
            && self.query_parameters.as_ref().is_none_or(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_credentials_deserialize_basic() {
        let json = r#"{"basic": {"username": "admin", "password": "nimda"}}"#;
        let credentials: Credentials = serde_json::from_str(json).unwrap();

        assert_eq!(credentials, Credentials::basic("admin", "nimda"));
    }

    #[test]
    fn test_credentials_deserialize_oauth_with_csrf() {
        let json = r#"{
            "oauth": {"url": "https://oauth.example.com", "clientId": "id", "clientSecret": "secret"},
            "csrfInfo": {"tokenEndpointURL": "https://csrf.example.com"}
        }"#;
        let credentials: Credentials = serde_json::from_str(json).unwrap();

        assert_eq!(
            credentials,
            Credentials::oauth("https://oauth.example.com", "id", "secret")
                .with_csrf("https://csrf.example.com")
        );
    }

    #[test]
    fn test_credentials_with_both_kinds_are_rejected() {
        let input = CredentialsInput {
            basic: Some(BasicAuth {
                username: "admin".to_string(),
                password: "nimda".to_string(),
            }),
            oauth: Some(OAuth {
                url: "https://oauth.example.com".to_string(),
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }),
            csrf_info: None,
        };

        let err = Credentials::try_from(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongInput);
    }

    #[test]
    fn test_credentials_with_no_kind_are_rejected() {
        assert!(serde_json::from_str::<Credentials>("{}").is_err());
        let err = Credentials::try_from(CredentialsInput::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongInput);
    }

    #[test]
    fn test_empty_bundle_credentials_decode_as_absent() {
        let json = r#"{
            "id": "app-id",
            "name": "app",
            "apiBundles": [
                {"id": "b1", "name": "b1", "defaultInstanceAuth": {"credentials": {}}},
                {"id": "b2", "name": "b2", "defaultInstanceAuth": {
                    "credentials": {"basic": {"username": "admin", "password": "nimda"}}
                }}
            ]
        }"#;
        let application: Application = serde_json::from_str(json).unwrap();

        assert_eq!(application.bundle("b1").unwrap().default_credentials(), None);
        assert_eq!(
            application.bundle("b2").unwrap().default_credentials(),
            Some(&Credentials::basic("admin", "nimda"))
        );
    }

    #[test]
    fn test_bundle_credentials_with_both_kinds_fail_decode() {
        let json = r#"{"credentials": {
            "basic": {"username": "admin", "password": "nimda"},
            "oauth": {"url": "https://oauth.example.com", "clientId": "id", "clientSecret": "secret"}
        }}"#;
        assert!(serde_json::from_str::<Auth>(json).is_err());
    }

    #[test]
    fn test_request_parameters_is_empty() {
        assert!(RequestParameters::default().is_empty());
        assert!(RequestParameters {
            headers: Some(ParameterMap::new()),
            query_parameters: None,
        }
        .is_empty());

        let params = RequestParameters {
            headers: Some(ParameterMap::from([(
                "header".to_string(),
                vec!["value".to_string()],
            )])),
            query_parameters: None,
        };
        assert!(!params.is_empty());
    }

    #[test]
    fn test_bundle_contains_any_specs() {
        let mut bundle = ApiBundle {
            api_definitions: vec![ApiDefinition::default()],
            ..ApiBundle::default()
        };
        assert!(!bundle.contains_any_specs());

        bundle.event_definitions.push(EventApiDefinition {
            spec: Some(EventApiSpec {
                data: Some("asyncapi: 2.0.0".to_string()),
                spec_type: EventApiSpecType::AsyncApi,
                format: SpecFormat::Yaml,
            }),
            ..EventApiDefinition::default()
        });
        assert!(bundle.contains_any_specs());
    }
}

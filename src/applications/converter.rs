//! # Application Converter
//!
//! Maps a Director [`model::Application`] to the Application CR the agent
//! owns. Pure: no cluster access, no secret contents.

use crate::constants::{
    CONNECTED_APP_LABEL_KEY, DESCRIPTION_NOT_PROVIDED, MANAGED_BY_LABEL_KEY,
    MANAGED_BY_LABEL_VALUE,
};
use crate::crd::{
    self, AppCredentials, ApplicationSpec, Authentication, CompassMetadata, ENTRY_TYPE_API,
    ENTRY_TYPE_EVENTS,
};
use crate::model::{self, ApiBundle, ApiDefinition, Credentials, EventApiDefinition, Labels};
use crate::naming::NameResolver;
use crate::secrets::strategy::CredentialStrategy;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Slug length before the hash suffix is appended
const MAX_SLUG_LENGTH: usize = 57;

static NON_ALPHANUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[^a-z0-9]+").expect("Failed to compile slug regex - this should never happen")
});

#[derive(Debug, Clone)]
pub struct Converter {
    names: NameResolver,
    central_gateway_url: String,
    skip_verify: bool,
}

impl Converter {
    pub fn new(names: NameResolver, central_gateway_url: impl Into<String>, skip_verify: bool) -> Self {
        Self {
            names,
            central_gateway_url: central_gateway_url.into(),
            skip_verify,
        }
    }

    #[must_use]
    pub fn convert(&self, application: &model::Application) -> crd::Application {
        let mut labels = convert_labels(&application.labels);
        labels.insert(CONNECTED_APP_LABEL_KEY.to_string(), application.name.clone());

        let spec = ApplicationSpec {
            description: application.description.clone(),
            skip_installation: false,
            skip_verify: self.skip_verify,
            services: application
                .api_bundles
                .iter()
                .map(|bundle| self.convert_bundle(&application.name, bundle))
                .collect(),
            labels,
            compass_metadata: Some(CompassMetadata {
                application_id: application.id.clone(),
                authentication: Authentication {
                    client_ids: application.system_auth_ids.clone(),
                },
            }),
        };

        let mut crd = crd::Application::new(&application.name, spec);
        crd.metadata.labels = Some(BTreeMap::from([(
            MANAGED_BY_LABEL_KEY.to_string(),
            MANAGED_BY_LABEL_VALUE.to_string(),
        )]));
        crd
    }

    fn convert_bundle(&self, application: &str, bundle: &ApiBundle) -> crd::Service {
        let description = bundle
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DESCRIPTION_NOT_PROVIDED)
            .to_string();

        let default_credentials = self.credentials_info(
            application,
            &bundle.id,
            bundle.default_credentials(),
        );
        let request_parameters_secret_name = match bundle.request_parameters() {
            Some(parameters) if !parameters.is_empty() => self
                .names
                .request_parameters_secret_name(application, &bundle.id),
            _ => String::new(),
        };

        let bundle_slug = slug(&bundle.name);
        let mut entries: Vec<crd::Entry> = bundle
            .api_definitions
            .iter()
            .map(|api| {
                self.convert_api(
                    application,
                    &bundle_slug,
                    api,
                    &default_credentials,
                    &request_parameters_secret_name,
                )
            })
            .collect();
        entries.extend(bundle.event_definitions.iter().map(convert_event));

        crd::Service {
            id: bundle.id.clone(),
            identifier: String::new(),
            name: service_name(&bundle.name, &bundle.id),
            display_name: bundle.name.clone(),
            description,
            auth_create_parameter_schema: bundle.instance_auth_request_input_schema.clone(),
            entries,
        }
    }

    fn convert_api(
        &self,
        application: &str,
        bundle_slug: &str,
        api: &ApiDefinition,
        default_credentials: &AppCredentials,
        request_parameters_secret_name: &str,
    ) -> crd::Entry {
        // Definition level credentials live in their own secret
        let credentials = match api.credentials.as_ref() {
            Some(_) => self.credentials_info(application, &api.id, api.credentials.as_ref()),
            None => default_credentials.clone(),
        };

        crd::Entry {
            id: api.id.clone(),
            name: api.name.clone(),
            entry_type: ENTRY_TYPE_API.to_string(),
            target_url: api.target_url.clone(),
            central_gateway_url: format!(
                "{}/{application}/{bundle_slug}/{}",
                self.central_gateway_url,
                slug(&api.name)
            ),
            credentials,
            request_parameters_secret_name: request_parameters_secret_name.to_string(),
        }
    }

    fn credentials_info(
        &self,
        application: &str,
        id: &str,
        credentials: Option<&Credentials>,
    ) -> AppCredentials {
        let Some(credentials) = credentials else {
            return AppCredentials::default();
        };
        let strategy = CredentialStrategy::for_credentials(credentials);
        if !strategy.credentials_provided(credentials) {
            return AppCredentials::default();
        }
        strategy.to_credentials_info(
            credentials,
            &self.names.credentials_secret_name(application, id),
        )
    }
}

fn convert_event(event: &EventApiDefinition) -> crd::Entry {
    crd::Entry {
        id: event.id.clone(),
        name: event.name.clone(),
        entry_type: ENTRY_TYPE_EVENTS.to_string(),
        ..crd::Entry::default()
    }
}

/// Strings pass through, lists of strings are joined with `,`, anything else
/// is dropped
fn convert_labels(labels: &Labels) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map(ToString::to_string))
                    .collect::<Option<Vec<_>>>()?
                    .join(","),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Lower-cased name with non-alphanumeric runs replaced by `-`, trimmed of
/// leading dashes and cut to 57 characters
fn slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    let trimmed = replaced.trim_start_matches('-');
    trimmed.chars().take(MAX_SLUG_LENGTH).collect()
}

/// Deterministic service name: the normalized name cut to 57 characters,
/// then the first 5 hex chars of sha1(id). Leading dashes are trimmed last so
/// empty or symbol-only names still yield a valid DNS label.
#[must_use]
pub fn service_name(display_name: &str, id: &str) -> String {
    let hash = format!("{:x}", Sha1::digest(id.as_bytes()));
    let lowered = display_name.to_lowercase();
    let normalized: String = NON_ALPHANUMERIC
        .replace_all(&lowered, "-")
        .chars()
        .take(MAX_SLUG_LENGTH)
        .collect();
    format!("{normalized}-{}", &hash[..5])
        .trim_start_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auth, RequestParameters};

    const CENTRAL: &str = "http://central-application-gateway.kyma-system.svc.cluster.local:8082";

    fn converter() -> Converter {
        Converter::new(NameResolver::new("kyma-integration"), CENTRAL, false)
    }

    #[test]
    fn test_service_name_matches_known_hashes() {
        assert_eq!(service_name("bundleName1", "bundle1"), "bundlename1-43857");
        assert_eq!(service_name("bundleName2", "bundle2"), "bundlename2-4b91a");
        assert_eq!(service_name("bundleName3", "bundle3"), "bundlename3-16aa4");
    }

    #[test]
    fn test_service_name_is_deterministic_and_id_sensitive() {
        assert_eq!(service_name("Orders API", "id-1"), service_name("Orders API", "id-1"));
        assert_ne!(service_name("Orders API", "id-1"), service_name("Orders API", "id-2"));
    }

    #[test]
    fn test_service_name_empty_or_symbol_only_has_no_leading_dash() {
        assert_eq!(service_name("", "bundle1"), "43857");
        assert_eq!(service_name("!!!", "bundle1"), "43857");
        assert_eq!(service_name("--Orders", "bundle1"), "orders-43857");
    }

    #[test]
    fn test_service_name_cuts_before_trimming_leading_symbols() {
        let long = format!("!{}", "a".repeat(60));
        let name = service_name(&long, "bundle1");

        assert_eq!(name, format!("{}-43857", "a".repeat(MAX_SLUG_LENGTH - 1)));
        assert!(!name.starts_with('-'));
        assert!(name.len() <= MAX_SLUG_LENGTH + 6);
    }

    #[test]
    fn test_slug_normalizes_and_truncates() {
        assert_eq!(slug("--Orders & Invoices API"), "orders-invoices-api");
        let long = format!("very{}", "very".repeat(30));
        assert_eq!(slug(&long).len(), MAX_SLUG_LENGTH);
    }

    #[test]
    fn test_convert_application_without_bundles() {
        let app = model::Application {
            id: "App1".to_string(),
            name: "Appname1".to_string(),
            labels: Labels::from([
                ("keySlice".to_string(), serde_json::json!(["value1", "value2"])),
                ("key".to_string(), serde_json::json!("value")),
                ("nested".to_string(), serde_json::json!({"a": 1})),
            ]),
            system_auth_ids: vec!["auth1".to_string(), "auth2".to_string()],
            ..model::Application::default()
        };

        let crd = converter().convert(&app);

        assert_eq!(crd.metadata.name.as_deref(), Some("Appname1"));
        assert_eq!(
            crd.metadata.labels.unwrap()[MANAGED_BY_LABEL_KEY],
            MANAGED_BY_LABEL_VALUE
        );
        assert_eq!(crd.spec.description, "");
        assert!(crd.spec.services.is_empty());
        assert_eq!(
            crd.spec.labels,
            BTreeMap::from([
                ("connected-app".to_string(), "Appname1".to_string()),
                ("key".to_string(), "value".to_string()),
                ("keySlice".to_string(), "value1,value2".to_string()),
            ])
        );
        assert_eq!(
            crd.spec.compass_metadata,
            Some(CompassMetadata {
                application_id: "App1".to_string(),
                authentication: Authentication {
                    client_ids: vec!["auth1".to_string(), "auth2".to_string()],
                },
            })
        );
    }

    #[test]
    fn test_convert_label_list_is_joined() {
        let app = model::Application {
            name: "app".to_string(),
            labels: Labels::from([("tags".to_string(), serde_json::json!(["a", "b"]))]),
            ..model::Application::default()
        };

        let crd = converter().convert(&app);
        assert_eq!(crd.spec.labels["tags"], "a,b");
    }

    #[test]
    fn test_convert_bundles_with_credentials_and_parameters() {
        let app = model::Application {
            id: "App1".to_string(),
            name: "Appname1".to_string(),
            description: "Description".to_string(),
            api_bundles: vec![
                ApiBundle {
                    id: "bundle1".to_string(),
                    name: "bundleName1".to_string(),
                    instance_auth_request_input_schema: Some("{}".to_string()),
                    api_definitions: vec![ApiDefinition {
                        id: "serviceId1".to_string(),
                        name: "serviceName1".to_string(),
                        target_url: "www.example.com/1".to_string(),
                        ..ApiDefinition::default()
                    }],
                    default_instance_auth: Some(Auth {
                        credentials: Some(
                            Credentials::oauth(
                                "https://oauth.example.com",
                                "test-client",
                                "test-secret",
                            )
                            .with_csrf("https://token.example.com"),
                        ),
                        request_parameters: None,
                    }),
                    ..ApiBundle::default()
                },
                ApiBundle {
                    id: "bundle2".to_string(),
                    name: "bundleName2".to_string(),
                    description: Some("description".to_string()),
                    api_definitions: vec![ApiDefinition {
                        id: "serviceId3".to_string(),
                        name: "serviceName3".to_string(),
                        target_url: "www.example.com/3".to_string(),
                        ..ApiDefinition::default()
                    }],
                    default_instance_auth: Some(Auth {
                        credentials: Some(Credentials::basic("my-username", "my-password")),
                        request_parameters: Some(RequestParameters {
                            headers: Some(crate::model::ParameterMap::from([(
                                "header".to_string(),
                                vec!["header-value".to_string()],
                            )])),
                            query_parameters: None,
                        }),
                    }),
                    ..ApiBundle::default()
                },
            ],
            ..model::Application::default()
        };

        let crd = converter().convert(&app);
        assert_eq!(crd.spec.description, "Description");

        let first = &crd.spec.services[0];
        assert_eq!(first.name, "bundlename1-43857");
        assert_eq!(first.display_name, "bundleName1");
        assert_eq!(first.description, DESCRIPTION_NOT_PROVIDED);
        assert_eq!(first.auth_create_parameter_schema.as_deref(), Some("{}"));
        let entry = &first.entries[0];
        assert_eq!(entry.entry_type, "API");
        assert_eq!(
            entry.central_gateway_url,
            format!("{CENTRAL}/Appname1/bundlename1/servicename1")
        );
        assert_eq!(entry.credentials.credentials_type, "OAuth");
        assert_eq!(entry.credentials.secret_name, "Appname1-bundle1");
        assert_eq!(entry.credentials.authentication_url, "https://oauth.example.com");
        assert_eq!(
            entry.credentials.csrf_info.as_ref().unwrap().token_endpoint_url,
            "https://token.example.com"
        );
        assert!(entry.request_parameters_secret_name.is_empty());

        let second = &crd.spec.services[1];
        assert_eq!(second.name, "bundlename2-4b91a");
        assert_eq!(second.description, "description");
        let entry = &second.entries[0];
        assert_eq!(entry.credentials.credentials_type, "Basic");
        assert_eq!(entry.credentials.secret_name, "Appname1-bundle2");
        assert!(entry.credentials.authentication_url.is_empty());
        assert_eq!(entry.request_parameters_secret_name, "params-Appname1-bundle2");
    }

    #[test]
    fn test_convert_events_and_long_api_names() {
        let app = model::Application {
            id: "App1".to_string(),
            name: "Appname1".to_string(),
            api_bundles: vec![ApiBundle {
                id: "bundle1".to_string(),
                name: "bundleName1".to_string(),
                api_definitions: vec![ApiDefinition {
                    id: "serviceId1".to_string(),
                    name: format!("{}longserviceName1", "very".repeat(20)),
                    target_url: "www.example.com/1".to_string(),
                    ..ApiDefinition::default()
                }],
                event_definitions: vec![EventApiDefinition {
                    id: "serviceId2".to_string(),
                    name: "serviceName2".to_string(),
                    ..EventApiDefinition::default()
                }],
                ..ApiBundle::default()
            }],
            ..model::Application::default()
        };

        let crd = converter().convert(&app);
        let entries = &crd.spec.services[0].entries;

        assert_eq!(
            entries[0].central_gateway_url,
            format!("{CENTRAL}/Appname1/bundlename1/{}v", "very".repeat(14))
        );
        assert!(entries[0].credentials.is_empty());
        assert_eq!(
            entries[1],
            crd::Entry {
                id: "serviceId2".to_string(),
                name: "serviceName2".to_string(),
                entry_type: "Events".to_string(),
                ..crd::Entry::default()
            }
        );
        assert_eq!(
            crd.spec.compass_metadata.unwrap().authentication.client_ids,
            Vec::<String>::new()
        );
    }

    #[test]
    fn test_definition_credentials_override_bundle_default() {
        let app = model::Application {
            name: "app".to_string(),
            api_bundles: vec![ApiBundle {
                id: "bundle".to_string(),
                name: "bundle".to_string(),
                api_definitions: vec![
                    ApiDefinition {
                        id: "api1".to_string(),
                        name: "api1".to_string(),
                        credentials: Some(Credentials::basic("user", "pass")),
                        ..ApiDefinition::default()
                    },
                    ApiDefinition {
                        id: "api2".to_string(),
                        name: "api2".to_string(),
                        ..ApiDefinition::default()
                    },
                ],
                default_instance_auth: Some(Auth {
                    credentials: Some(Credentials::oauth("https://oauth", "id", "secret")),
                    request_parameters: None,
                }),
                ..ApiBundle::default()
            }],
            ..model::Application::default()
        };

        let crd = converter().convert(&app);
        let entries = &crd.spec.services[0].entries;

        assert_eq!(entries[0].credentials.credentials_type, "Basic");
        assert_eq!(entries[0].credentials.secret_name, "app-api1");
        assert_eq!(entries[1].credentials.credentials_type, "OAuth");
        assert_eq!(entries[1].credentials.secret_name, "app-bundle");
    }

    #[test]
    fn test_skip_verify_is_carried() {
        let converter = Converter::new(NameResolver::new("ns"), CENTRAL, true);
        let crd = converter.convert(&model::Application {
            name: "app".to_string(),
            ..model::Application::default()
        });
        assert!(crd.spec.skip_verify);
    }
}

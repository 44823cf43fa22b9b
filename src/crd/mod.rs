//! # Custom Resource Definitions
//!
//! The `Application` custom resource (`applicationconnector.kyma-project.io/v1alpha1`)
//! the agent reconciles Director applications into.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Application spec and Compass metadata
//! - `services.rs` - Services, entries and the credentials pointer stored on entries

mod services;
mod spec;

pub use services::{AppCredentials, CsrfInfo, Entry, Service};
pub use spec::{Application, ApplicationSpec, Authentication, CompassMetadata};

/// Entry type for API definitions
pub const ENTRY_TYPE_API: &str = "API";

/// Entry type for event definitions
pub const ENTRY_TYPE_EVENTS: &str = "Events";

/// Credentials type tag of OAuth credentials
pub const CREDENTIALS_TYPE_OAUTH: &str = "OAuth";

/// Credentials type tag of Basic credentials
pub const CREDENTIALS_TYPE_BASIC: &str = "Basic";

/// Owner reference pointing at the Application named `application`.
///
/// Every secret, service and Istio object created for an application carries
/// one so that deleting the Application garbage-collects them.
#[must_use]
pub fn owner_reference(
    application: &str,
    app_uid: &str,
) -> k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
    use kube::Resource;

    k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
        api_version: Application::api_version(&()).to_string(),
        kind: Application::kind(&()).to_string(),
        name: application.to_string(),
        uid: app_uid.to_string(),
        ..Default::default()
    }
}

/// `app`/`serviceId` labels shared by every per-service object
#[must_use]
pub fn service_labels(
    application: &str,
    service_id: &str,
) -> std::collections::BTreeMap<String, String> {
    std::collections::BTreeMap::from([
        (
            crate::constants::LABEL_APPLICATION.to_string(),
            application.to_string(),
        ),
        (
            crate::constants::LABEL_SERVICE_ID.to_string(),
            service_id.to_string(),
        ),
    ])
}

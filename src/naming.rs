//! # Name Resolution
//!
//! Deterministic names for every Kubernetes object derived from an
//! `(application, id)` pair.
//!
//! Names have the form `{application}-{id}`. The application part is shortened
//! so the result fits the 63 character object name limit, reserving room for a
//! full 36 character id. The id itself is never truncated, so two pairs with
//! different ids can never collide.

use crate::constants::{
    MAX_RESOURCE_NAME_LENGTH, REQUEST_PARAMETERS_SECRET_PREFIX, RESOURCE_ID_LENGTH,
};

#[derive(Debug, Clone)]
pub struct NameResolver {
    namespace: String,
}

impl NameResolver {
    /// `namespace` is the integration namespace the gateway services live in
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name shared by the access service and Istio objects of a service
    #[must_use]
    pub fn resource_name(&self, application: &str, id: &str) -> String {
        resource_name_within(application, id, MAX_RESOURCE_NAME_LENGTH)
    }

    #[must_use]
    pub fn credentials_secret_name(&self, application: &str, id: &str) -> String {
        self.resource_name(application, id)
    }

    #[must_use]
    pub fn request_parameters_secret_name(&self, application: &str, id: &str) -> String {
        let budget = MAX_RESOURCE_NAME_LENGTH - REQUEST_PARAMETERS_SECRET_PREFIX.len();
        format!(
            "{REQUEST_PARAMETERS_SECRET_PREFIX}{}",
            resource_name_within(application, id, budget)
        )
    }

    /// In-cluster URL of the access service for `(application, id)`
    #[must_use]
    pub fn gateway_url(&self, application: &str, id: &str) -> String {
        format!(
            "http://{}.{}.svc.cluster.local",
            self.resource_name(application, id),
            self.namespace
        )
    }
}

fn resource_name_within(application: &str, id: &str, budget: usize) -> String {
    format!("{}-{id}", truncate_application(application, budget))
}

/// Cut `application` so that `{application}-{uuid}` fits in `budget`.
///
/// The cut is on a character boundary; Kubernetes names are ASCII in practice.
fn truncate_application(application: &str, budget: usize) -> &str {
    let max_prefix = budget.saturating_sub(RESOURCE_ID_LENGTH + 1);
    if application.len() <= max_prefix {
        return application;
    }

    let mut end = max_prefix;
    while !application.is_char_boundary(end) {
        end -= 1;
    }
    &application[..end]
}

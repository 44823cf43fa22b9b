//! # Constants
//!
//! Shared constants used throughout the agent.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::AgentConfig`]).

/// Maximum length of a Kubernetes object name
pub const MAX_RESOURCE_NAME_LENGTH: usize = 63;

/// Length of the UUID-shaped identifiers Director assigns to bundles and definitions
pub const RESOURCE_ID_LENGTH: usize = 36;

/// Prefix of request parameters secret names
pub const REQUEST_PARAMETERS_SECRET_PREFIX: &str = "params-";

/// Label carrying the owning application name
pub const LABEL_APPLICATION: &str = "app";

/// Label carrying the service (bundle) id
pub const LABEL_SERVICE_ID: &str = "serviceId";

/// Label marking objects created by this agent
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL_KEY`]
pub const MANAGED_BY_LABEL_VALUE: &str = "compass-runtime-agent";

/// Application spec label pointing at the connected application
pub const CONNECTED_APP_LABEL_KEY: &str = "connected-app";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "compass-runtime-agent";

/// Default integration namespace for secrets, services and Istio objects
pub const DEFAULT_NAMESPACE: &str = "kyma-integration";

/// Default port of the per-application gateway
pub const DEFAULT_GATEWAY_PORT: i32 = 8080;

/// Default central application gateway URL
pub const DEFAULT_CENTRAL_GATEWAY_URL: &str =
    "http://central-application-gateway.kyma-system.svc.cluster.local:8082";

/// Default Rafter upload service URL
pub const DEFAULT_UPLOAD_SERVICE_URL: &str =
    "http://rafter-upload-service.kyma-system.svc.cluster.local:80";

/// Default Director proxy port
pub const DEFAULT_PROXY_PORT: u16 = 8081;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval between reconciliation cycles (seconds)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default interval between client certificate refreshes (seconds)
pub const DEFAULT_CERT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Default secret holding the agent's client certificate, as `namespace/name`
pub const DEFAULT_CLUSTER_CERTIFICATES_SECRET: &str = "compass-system/cluster-client-certificates";

/// Key of the PEM certificate chain in the client certificate secret
pub const CERTIFICATE_SECRET_CRT_KEY: &str = "crt";

/// Key of the PEM private key in the client certificate secret
pub const CERTIFICATE_SECRET_KEY_KEY: &str = "key";

/// Body returned by the Director proxy before it has been configured
pub const PROXY_NOT_CONFIGURED_BODY: &str = "Director proxy is not configured";

/// Maximum request body forwarded by the Director proxy (bytes)
pub const PROXY_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Placeholder for services without a description
pub const DESCRIPTION_NOT_PROVIDED: &str = "Description not provided";

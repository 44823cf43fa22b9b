//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use runtime_agent::prelude::*;
//! ```

// CRD types
pub use crate::crd::{AppCredentials, Application, ApplicationSpec, CompassMetadata, Entry, Service};

// Director model
pub use crate::model::{ApiBundle, ApiDefinition, Credentials, EventApiDefinition, Labels, RequestParameters};

// Errors
pub use crate::error::{AppError, ErrorAccumulator, ErrorKind};

// Configuration
pub use crate::config::AgentConfig;

// Collaborator seams
pub use crate::apiresources::{AccessServiceManager, AssetStore, IstioService};
pub use crate::applications::ApplicationRepository;
pub use crate::director::ConfigClient;
pub use crate::proxy::CertificateSource;
pub use crate::secrets::SecretRepository;

// Services
pub use crate::apiresources::ApiResourcesService;
pub use crate::applications::Converter;
pub use crate::director::Synchronizer;
pub use crate::naming::NameResolver;
pub use crate::proxy::Proxy;
pub use crate::secrets::{CredentialsService, RequestParametersService};
pub use crate::sync::{Operation, SyncResult, SyncService};

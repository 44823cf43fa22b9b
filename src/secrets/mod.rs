//! # Secrets
//!
//! Credential and request parameter secrets for application services.
//!
//! - `strategy` - Basic and OAuth encoding of credentials into secret data
//! - `repository` - Secret CRUD over the Kubernetes API
//! - `credentials` - Credentials secrets and the pointers stored on the CR
//! - `request_parameters` - Extra headers and query parameters secrets

pub mod credentials;
pub mod repository;
pub mod request_parameters;
pub mod strategy;

pub use credentials::CredentialsService;
pub use repository::{KubeSecretRepository, SecretRepository};
pub use request_parameters::RequestParametersService;
pub use strategy::{CredentialStrategy, SecretData};

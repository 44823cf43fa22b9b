//! # Applications
//!
//! - `converter` - Director application to Application CR mapping
//! - `repository` - Application CR persistence

pub mod converter;
pub mod repository;

pub use converter::Converter;
pub use repository::{ApplicationRepository, KubeApplicationRepository};

//! Compass Runtime Agent Library
//!
//! Synchronizes the applications the Director assigns to this runtime into
//! Application custom resources, credential and request parameter secrets,
//! access services, Istio objects and asset store documents.
//!
//! ## Quick Start
//!
//! ```rust
//! use runtime_agent::prelude::*;
//! ```
//!
//! The Director transport is not part of this crate: embedders implement
//! [`director::ConfigClient`] and hand it to a [`director::Synchronizer`].

pub mod apiresources;
pub mod applications;
pub mod config;
pub mod constants;
pub mod crd;
pub mod director;
pub mod error;
pub mod model;
pub mod naming;
pub mod observability;
pub mod prelude;
pub mod proxy;
pub mod secrets;
pub mod server;
pub mod sync;

//! # Configuration
//!
//! Agent settings loaded from environment variables.

mod agent;

pub use agent::{AgentConfig, LogFormat};

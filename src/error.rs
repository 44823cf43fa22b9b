//! # Errors
//!
//! Error type shared by every service in the agent.
//!
//! An [`AppError`] always carries an [`ErrorKind`]. Context added with
//! [`AppError::append`] never changes the kind, so callers can still classify a
//! failure after it has travelled through several layers. Independent failures
//! are collected with [`ErrorAccumulator`], which composes them into one error
//! while keeping every cause inspectable.

use std::fmt;
use thiserror::Error;

/// Classification of an [`AppError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unexpected infrastructure failure (encoding, client I/O, conflicts)
    Internal,
    /// The requested object does not exist
    NotFound,
    /// The object to create already exists
    AlreadyExists,
    /// Invalid combination of input fields
    WrongInput,
    /// The Director could not be reached
    UpstreamServerCallFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Internal => "Internal",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::WrongInput => "WrongInput",
            Self::UpstreamServerCallFailed => "UpstreamServerCallFailed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.context, .message, .causes))]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    /// Outermost context first
    context: Vec<String>,
    /// Set only on errors composed by [`ErrorAccumulator`]
    causes: Vec<AppError>,
}

fn render(context: &[String], message: &str, causes: &[AppError]) -> String {
    let body = if causes.is_empty() {
        message.to_string()
    } else {
        causes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    };

    if context.is_empty() {
        body
    } else {
        format!("{}, {body}", context.join(", "))
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            causes: Vec::new(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn wrong_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrongInput, message)
    }

    pub fn upstream_server_call_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamServerCallFailed, message)
    }

    /// Map a Kubernetes API error onto the agent's taxonomy.
    ///
    /// 404 becomes `NotFound`, a 409 with reason `AlreadyExists` becomes
    /// `AlreadyExists`. Everything else, including optimistic-concurrency
    /// conflicts, is `Internal` and left for the next cycle.
    pub fn from_kube(err: &kube::Error, action: &str) -> Self {
        match err {
            kube::Error::Api(status) if status.code == 404 => {
                Self::not_found(format!("{action}: {}", status.message))
            }
            kube::Error::Api(status) if status.code == 409 && status.reason == "AlreadyExists" => {
                Self::already_exists(format!("{action}: {}", status.message))
            }
            other => Self::internal(format!("{action}: {other}")),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of the root failure, without context
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Errors composed into this one; empty for a single failure
    #[must_use]
    pub fn causes(&self) -> &[AppError] {
        &self.causes
    }

    /// Add context in front of the message. The kind is preserved.
    #[must_use]
    pub fn append(mut self, context: impl Into<String>) -> Self {
        self.context.insert(0, context.into());
        self
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }
}

/// Collects failures of independent steps without short-circuiting.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    errors: Vec<AppError>,
}

impl ErrorAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one step
    pub fn record<T>(&mut self, result: Result<T, AppError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn push(&mut self, err: AppError) {
        // Flatten so callers see a single level of causes
        if err.causes.is_empty() || !err.context.is_empty() {
            self.errors.push(err);
        } else {
            self.errors.extend(err.causes);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing failed, the error itself when exactly one step
    /// failed, otherwise a composite error whose kind is the first failure's.
    pub fn into_result(self) -> Result<(), AppError> {
        match self.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn into_error(mut self) -> Option<AppError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => {
                let first = &self.errors[0];
                Some(AppError {
                    kind: first.kind,
                    message: first.message.clone(),
                    context: Vec::new(),
                    causes: self.errors,
                })
            }
        }
    }
}

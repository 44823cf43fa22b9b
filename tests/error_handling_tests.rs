//! # Error Handling Tests
//!
//! Error classification survives context and accumulation.

use runtime_agent::error::{AppError, ErrorAccumulator, ErrorKind};

#[test]
fn test_context_chain_keeps_kind() {
    let err = AppError::not_found("secret shop-b1 not found")
        .append("Failed to read credentials")
        .append("Failed to update service b1");

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "Failed to update service b1, Failed to read credentials, secret shop-b1 not found"
    );
}

#[test]
fn test_accumulator_reports_every_step() {
    let steps: Vec<Result<(), AppError>> = vec![
        Ok(()),
        Err(AppError::already_exists("service exists")),
        Ok(()),
        Err(AppError::internal("istio unavailable").append("Failed to create Istio resources")),
    ];

    let mut errors = ErrorAccumulator::new();
    for step in steps {
        errors.record(step);
    }
    assert_eq!(errors.len(), 2);

    let err = errors.into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    let kinds: Vec<ErrorKind> = err.causes().iter().map(AppError::kind).collect();
    assert_eq!(kinds, vec![ErrorKind::AlreadyExists, ErrorKind::Internal]);
    assert!(err.to_string().contains("Failed to create Istio resources, istio unavailable"));
}

#[test]
fn test_accumulated_error_with_context_stays_nested() {
    let mut inner = ErrorAccumulator::new();
    inner.push(AppError::internal("a"));
    inner.push(AppError::internal("b"));
    let inner = inner.into_error().unwrap().append("Failed to update application shop");

    let mut outer = ErrorAccumulator::new();
    outer.push(inner);
    outer.push(AppError::wrong_input("both credential kinds"));

    let err = outer.into_result().unwrap_err();
    assert_eq!(err.causes().len(), 2);
    assert_eq!(err.causes()[0].causes().len(), 2);
}

#[test]
fn test_empty_accumulator_is_ok() {
    assert!(ErrorAccumulator::new().into_error().is_none());
}

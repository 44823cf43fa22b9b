//! # Director Synchronization
//!
//! Drives reconciliation cycles: fetch the applications assigned to this
//! runtime from the Director, apply them, record the outcome.
//!
//! The transport to the Director is supplied by the embedding layer through
//! [`ConfigClient`].

use crate::error::AppError;
use crate::model::{Application, Labels};
use crate::observability::metrics;
use crate::sync::SyncService;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Source of the runtime's configuration
#[async_trait]
pub trait ConfigClient: Send + Sync {
    /// Applications assigned to the runtime plus the runtime labels.
    ///
    /// Returns an error instead of partial data when the call fails.
    async fn fetch_configuration(&self) -> Result<(Vec<Application>, Labels), AppError>;
}

/// Counts of one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Synchronizer {
    config_client: Arc<dyn ConfigClient>,
    sync_service: SyncService,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("sync_service", &self.sync_service)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    pub fn new(config_client: Arc<dyn ConfigClient>, sync_service: SyncService) -> Self {
        Self {
            config_client,
            sync_service,
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// A failed fetch aborts the cycle before anything is applied.
    pub async fn synchronize(&self) -> Result<CycleSummary, AppError> {
        let started = Instant::now();
        metrics::increment_sync_cycles();

        let outcome = self.cycle().await;

        metrics::observe_sync_duration(started.elapsed().as_secs_f64());
        if outcome.is_err() {
            metrics::increment_sync_errors();
        }
        outcome
    }

    async fn cycle(&self) -> Result<CycleSummary, AppError> {
        let (applications, labels) = self
            .config_client
            .fetch_configuration()
            .await
            .map_err(|e| {
                AppError::upstream_server_call_failed(e.to_string())
                    .append("Failed to fetch configuration from Director")
            })?;
        info!(
            "Fetched {} applications and {} runtime labels from Director",
            applications.len(),
            labels.len()
        );

        let results = self.sync_service.apply(&applications).await?;

        let mut summary = CycleSummary::default();
        for result in &results {
            let operation = result.operation.to_string();
            match &result.error {
                None => {
                    summary.succeeded += 1;
                    info!(
                        "Application '{}' ({}): {operation} succeeded",
                        result.application_name, result.application_id
                    );
                }
                Some(e) => {
                    summary.failed += 1;
                    warn!(
                        "Application '{}' ({}): {operation} failed: {e}",
                        result.application_name, result.application_id
                    );
                }
            }
            metrics::record_application_operation(&operation, result.error.is_none());
        }

        info!(
            "Synchronization finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Repeat cycles every `interval` until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. A cycle in progress is allowed to
    /// finish before the loop stops.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Synchronizer stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.synchronize().await {
                        error!("Synchronization cycle failed: {e}");
                    }
                }
            }
        }
    }
}

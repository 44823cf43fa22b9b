//! Client certificate source and the loop keeping the proxy current.

use super::Proxy;
use crate::constants::{CERTIFICATE_SECRET_CRT_KEY, CERTIFICATE_SECRET_KEY_KEY};
use crate::error::AppError;
use crate::observability::metrics;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// PEM certificate chain and private key. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ClientCertificate {
    certificate: Vec<u8>,
    key: Vec<u8>,
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

impl ClientCertificate {
    #[must_use]
    pub fn new(certificate: Vec<u8>, key: Vec<u8>) -> Self {
        Self { certificate, key }
    }

    /// Key followed by the certificate chain, as one PEM bundle
    pub(crate) fn to_pem(&self) -> zeroize::Zeroizing<Vec<u8>> {
        let mut pem = Vec::with_capacity(self.key.len() + self.certificate.len() + 1);
        pem.extend_from_slice(&self.key);
        if !self.key.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(&self.certificate);
        zeroize::Zeroizing::new(pem)
    }
}

#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch(&self) -> Result<ClientCertificate, AppError>;
}

/// Reads the certificate from a Secret holding `crt` and `key`
#[derive(Clone)]
pub struct KubeCertificateSource {
    api: Api<Secret>,
    name: String,
}

impl std::fmt::Debug for KubeCertificateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCertificateSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl KubeCertificateSource {
    /// `secret` is `namespace/name`; a bare name uses `default_namespace`
    pub fn new(client: Client, secret: &str, default_namespace: &str) -> Self {
        let (namespace, name) = split_secret_reference(secret, default_namespace);
        Self {
            api: Api::namespaced(client, namespace),
            name: name.to_string(),
        }
    }
}

fn split_secret_reference<'a>(secret: &'a str, default_namespace: &'a str) -> (&'a str, &'a str) {
    secret
        .split_once('/')
        .unwrap_or((default_namespace, secret))
}

#[async_trait]
impl CertificateSource for KubeCertificateSource {
    async fn fetch(&self) -> Result<ClientCertificate, AppError> {
        let secret = self
            .api
            .get(&self.name)
            .await
            .map_err(|e| AppError::from_kube(&e, &format!("Failed to read certificate secret {}", self.name)))?;

        let data = secret.data.unwrap_or_default();
        let field = |key: &str| {
            data.get(key)
                .map(|value| value.0.clone())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AppError::not_found(format!("certificate secret {} has no {key} entry", self.name))
                })
        };

        Ok(ClientCertificate::new(
            field(CERTIFICATE_SECRET_CRT_KEY)?,
            field(CERTIFICATE_SECRET_KEY_KEY)?,
        ))
    }
}

/// Pushes certificate rotations into the proxy
pub struct CertificateRefresher {
    source: Arc<dyn CertificateSource>,
    proxy: Arc<Proxy>,
    director_url: String,
    applied: Option<(ClientCertificate, String)>,
}

impl std::fmt::Debug for CertificateRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRefresher")
            .field("director_url", &self.director_url)
            .finish_non_exhaustive()
    }
}

impl CertificateRefresher {
    pub fn new(source: Arc<dyn CertificateSource>, proxy: Arc<Proxy>, director_url: impl Into<String>) -> Self {
        Self {
            source,
            proxy,
            director_url: director_url.into(),
            applied: None,
        }
    }

    /// Fetch the certificate and update the proxy if the certificate or the
    /// URL changed. Returns whether the proxy was updated.
    pub async fn refresh(&mut self) -> Result<bool, AppError> {
        let certificate = self.source.fetch().await?;

        let unchanged = self
            .applied
            .as_ref()
            .is_some_and(|(cert, url)| *cert == certificate && *url == self.director_url);
        if unchanged {
            debug!("Client certificate unchanged, proxy not updated");
            return Ok(false);
        }

        self.proxy.update_cert_and_url(&certificate, &self.director_url)?;
        metrics::increment_certificate_refreshes();
        info!("Director proxy updated with refreshed client certificate");

        self.applied = Some((certificate, self.director_url.clone()));
        Ok(true)
    }

    /// Refresh every `interval` until `shutdown` resolves
    pub async fn run<F>(mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!("Failed to refresh client certificate: {e}");
                    }
                }
            }
        }
    }
}

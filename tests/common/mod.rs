//! In-memory collaborators shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use runtime_agent::apiresources::{AccessServiceManager, Asset, AssetStore, IstioService};
use runtime_agent::applications::repository::merge_managed_fields;
use runtime_agent::applications::ApplicationRepository;
use runtime_agent::crd::Application;
use runtime_agent::error::AppError;
use runtime_agent::secrets::{SecretData, SecretRepository};
use std::collections::BTreeMap;
use std::sync::Mutex;

fn name_of(application: &Application) -> String {
    application.metadata.name.clone().unwrap_or_default()
}

#[derive(Debug, Default)]
pub struct Applications {
    pub stored: Mutex<BTreeMap<String, Application>>,
}

impl Applications {
    pub fn names(&self) -> Vec<String> {
        self.stored.lock().unwrap().keys().cloned().collect()
    }

    pub fn get_stored(&self, name: &str) -> Option<Application> {
        self.stored.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ApplicationRepository for Applications {
    async fn create(&self, application: &Application) -> Result<Application, AppError> {
        let name = name_of(application);
        let mut created = application.clone();
        created.metadata.uid = Some(format!("{name}-uid"));
        let mut stored = self.stored.lock().unwrap();
        if stored.contains_key(&name) {
            return Err(AppError::already_exists(format!("application {name} exists")));
        }
        stored.insert(name, created.clone());
        Ok(created)
    }

    async fn update(&self, application: &Application) -> Result<Application, AppError> {
        let name = name_of(application);
        let mut stored = self.stored.lock().unwrap();
        let current = stored
            .get(&name)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("application {name} not found")))?;
        let merged = merge_managed_fields(current, application);
        stored.insert(name, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.stored.lock().unwrap().remove(name);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Application, AppError> {
        self.get_stored(name)
            .ok_or_else(|| AppError::not_found(format!("application {name} not found")))
    }

    async fn list(&self) -> Result<Vec<Application>, AppError> {
        Ok(self.stored.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct Secrets {
    pub stored: Mutex<BTreeMap<String, SecretData>>,
}

impl Secrets {
    pub fn names(&self) -> Vec<String> {
        self.stored.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl SecretRepository for Secrets {
    async fn create(
        &self,
        _application: &str,
        _app_uid: &str,
        name: &str,
        _service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError> {
        let mut stored = self.stored.lock().unwrap();
        if stored.contains_key(name) {
            return Err(AppError::already_exists(format!("secret {name} exists")));
        }
        stored.insert(name.to_string(), data.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<SecretData, AppError> {
        self.stored
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("secret {name} not found")))
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.stored.lock().unwrap().remove(name);
        Ok(())
    }

    async fn upsert(
        &self,
        _application: &str,
        _app_uid: &str,
        name: &str,
        _service_id: &str,
        data: &SecretData,
    ) -> Result<(), AppError> {
        self.stored
            .lock()
            .unwrap()
            .insert(name.to_string(), data.clone());
        Ok(())
    }
}

/// Names of the objects one collaborator currently keeps, with the number of
/// assets for asset groups
#[derive(Debug, Default)]
pub struct Objects {
    pub live: Mutex<BTreeMap<String, usize>>,
}

impl Objects {
    pub fn names(&self) -> Vec<String> {
        self.live.lock().unwrap().keys().cloned().collect()
    }

    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.live.lock().unwrap().get(name).copied()
    }

    fn insert(&self, name: &str, size: usize) -> Result<(), AppError> {
        self.live.lock().unwrap().insert(name.to_string(), size);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), AppError> {
        self.live.lock().unwrap().remove(name);
        Ok(())
    }
}

#[async_trait]
impl AccessServiceManager for Objects {
    async fn create(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
        self.insert(name, 0)
    }

    async fn upsert(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
        self.insert(name, 0)
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.remove(name)
    }
}

#[async_trait]
impl IstioService for Objects {
    async fn create(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
        self.insert(name, 0)
    }

    async fn upsert(&self, _: &str, _: &str, _: &str, name: &str) -> Result<(), AppError> {
        self.insert(name, 0)
    }

    async fn delete(&self, name: &str) -> Result<(), AppError> {
        self.remove(name)
    }
}

#[async_trait]
impl AssetStore for Objects {
    async fn put(&self, id: &str, assets: &[Asset]) -> Result<(), AppError> {
        self.insert(id, assets.len())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.remove(id)
    }
}

//! Access to desired objects and their status subresource
//!
//! Reconcilers read the current object by key and write back status through
//! [`ObjectStore`]. [`KubeStore`] goes to the API server; [`MemoryStore`]
//! keeps objects in a map for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::reflector::ObjectRef,
    Client, Resource,
};
use serde::Serialize;
use serde_json::json;

use crate::crd::{DeployChart, DeployChartStatus, Repository, RepositoryStatus};
use crate::error::{Error, Result};

/// Field manager recorded on status patches
pub const FIELD_MANAGER: &str = "happy-helm";

/// A resource with a status subresource owned by this operator
pub trait StatusResource: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    type Status: Clone + Serialize + Send + Sync + 'static;

    fn status_mut(&mut self) -> &mut Option<Self::Status>;
}

impl StatusResource for DeployChart {
    type Status = DeployChartStatus;

    fn status_mut(&mut self) -> &mut Option<DeployChartStatus> {
        &mut self.status
    }
}

impl StatusResource for Repository {
    type Status = RepositoryStatus;

    fn status_mut(&mut self) -> &mut Option<RepositoryStatus> {
        &mut self.status
    }
}

/// Fetch desired objects and persist their status
#[async_trait]
pub trait ObjectStore<K: StatusResource>: Send + Sync {
    /// Current object, or `None` once it no longer exists
    async fn get(&self, key: &ObjectRef<K>) -> Result<Option<K>>;

    async fn patch_status(&self, key: &ObjectRef<K>, status: &K::Status) -> Result<()>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deploy_charts(&self, key: &ObjectRef<DeployChart>) -> Result<Api<DeployChart>> {
        let namespace = key.namespace.as_deref().ok_or_else(|| {
            Error::ConfigError(format!("DeployChart {} has no namespace", key.name))
        })?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }

    fn repositories(&self) -> Api<Repository> {
        Api::all(self.client.clone())
    }
}

fn status_patch<S: Serialize>(status: &S) -> serde_json::Value {
    json!({ "status": status })
}

#[async_trait]
impl ObjectStore<DeployChart> for KubeStore {
    async fn get(&self, key: &ObjectRef<DeployChart>) -> Result<Option<DeployChart>> {
        Ok(self.deploy_charts(key)?.get_opt(&key.name).await?)
    }

    async fn patch_status(
        &self,
        key: &ObjectRef<DeployChart>,
        status: &DeployChartStatus,
    ) -> Result<()> {
        self.deploy_charts(key)?
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch(status)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore<Repository> for KubeStore {
    async fn get(&self, key: &ObjectRef<Repository>) -> Result<Option<Repository>> {
        Ok(self.repositories().get_opt(&key.name).await?)
    }

    async fn patch_status(
        &self,
        key: &ObjectRef<Repository>,
        status: &RepositoryStatus,
    ) -> Result<()> {
        self.repositories()
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch(status)),
            )
            .await?;
        Ok(())
    }
}

/// In-memory [`ObjectStore`]
///
/// Status writes replace the stored object's status and are also kept in
/// order so tests can assert on exactly what was persisted.
pub struct MemoryStore<K: StatusResource> {
    objects: Mutex<HashMap<ObjectRef<K>, K>>,
    writes: Mutex<Vec<(ObjectRef<K>, K::Status)>>,
    fail_writes: Mutex<bool>,
}

impl<K: StatusResource> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(false),
        }
    }
}

impl<K: StatusResource> MemoryStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an object, returning its key
    pub fn put(&self, object: K) -> ObjectRef<K> {
        let key = ObjectRef::from_obj(&object);
        lock(&self.objects).insert(key.clone(), object);
        key
    }

    pub fn remove(&self, key: &ObjectRef<K>) -> Option<K> {
        lock(&self.objects).remove(key)
    }

    pub fn object(&self, key: &ObjectRef<K>) -> Option<K> {
        lock(&self.objects).get(key).cloned()
    }

    /// Every status persisted so far, oldest first
    pub fn status_writes(&self) -> Vec<(ObjectRef<K>, K::Status)> {
        lock(&self.writes).clone()
    }

    /// Make status writes fail until called again with `false`
    pub fn fail_status_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl<K: StatusResource> ObjectStore<K> for MemoryStore<K> {
    async fn get(&self, key: &ObjectRef<K>) -> Result<Option<K>> {
        Ok(self.object(key))
    }

    async fn patch_status(&self, key: &ObjectRef<K>, status: &K::Status) -> Result<()> {
        if *lock(&self.fail_writes) {
            return Err(Error::KubeError(kube::Error::Api(
                kube::error::ErrorResponse {
                    status: "Failure".to_string(),
                    message: "the server is currently unable to handle the request".to_string(),
                    reason: "ServiceUnavailable".to_string(),
                    code: 503,
                },
            )));
        }

        let mut objects = lock(&self.objects);
        let object = objects.get_mut(key).ok_or_else(|| {
            Error::KubeError(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} not found", key.name),
                reason: "NotFound".to_string(),
                code: 404,
            }))
        })?;
        *object.status_mut() = Some(status.clone());
        lock(&self.writes).push((key.clone(), status.clone()));
        Ok(())
    }
}

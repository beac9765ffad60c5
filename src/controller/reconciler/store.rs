//! # Object Store
//!
//! The reconciler's view of the cluster. [`KubeStore`] talks to the API server; tests
//! plug in an in-memory store.

use crate::constants::FIELD_MANAGER;
use crate::crd::{SopsSecret, SopsSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Reads and writes the reconciler needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(None)` when the resource does not exist
    async fn get_sops_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SopsSecret>, StoreError>;

    /// `Ok(None)` when the Secret does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace a Secret; conditional on `metadata.resourceVersion` when set
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SopsSecretStatus,
    ) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn not_found_to_none<T>(result: Result<T, kube::Error>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(StoreError::Api(e)),
    }
}

fn secret_namespace(secret: &Secret) -> Result<String, StoreError> {
    secret
        .namespace()
        .ok_or_else(|| StoreError::Unavailable(format!("secret {} has no namespace", secret.name_any())))
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_sops_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SopsSecret>, StoreError> {
        let api: Api<SopsSecret> = Api::namespaced(self.client.clone(), namespace);
        not_found_to_none(api.get(name).await)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        not_found_to_none(api.get(name).await)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret_namespace(secret)?);
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        Ok(api.create(&pp, secret).await?)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret_namespace(secret)?);
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        Ok(api.replace(&secret.name_any(), &pp, secret).await?)
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SopsSecretStatus,
    ) -> Result<(), StoreError> {
        let api: Api<SopsSecret> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

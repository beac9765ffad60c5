//! Common test utilities
//!
//! An in-memory [`ObjectStore`] with failure and latency injection, and helpers that
//! build SopsSecrets encrypted to a throwaway age identity.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use sops_secrets_controller::config::ControllerConfig;
use sops_secrets_controller::controller::decryption::keys::wrap_data_key;
use sops_secrets_controller::controller::decryption::{encrypt_document, DataKey, KeyServices};
use sops_secrets_controller::controller::reconciler::{ObjectStore, Reconciler, StoreError};
use sops_secrets_controller::crd::{
    SecretTemplate, SopsMetadata, SopsSecret, SopsSecretSpec, SopsSecretStatus,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "default";

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_owned(), name.to_owned())
}

/// In-memory stand-in for the Kubernetes API
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sops_secrets: Mutex<BTreeMap<Key, SopsSecret>>,
    secrets: Mutex<BTreeMap<Key, Secret>>,
    next_uid: AtomicU64,
    creates: AtomicUsize,
    replaces: AtomicUsize,
    status_writes: AtomicUsize,
    fail_get_sops_secret: AtomicBool,
    fail_get_secret: AtomicBool,
    fail_create: AtomicBool,
    fail_replace: AtomicBool,
    secret_latency: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn uid(&self) -> String {
        format!("uid-{}", self.next_uid.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Store a SopsSecret, assigning a uid when it has none
    pub fn insert_sops_secret(&self, mut resource: SopsSecret) -> SopsSecret {
        if resource.metadata.uid.is_none() {
            resource.metadata.uid = Some(self.uid());
        }
        resource.metadata.resource_version = Some("1".into());
        let namespace = resource.namespace().unwrap_or_default();
        self.sops_secrets
            .lock()
            .unwrap()
            .insert(key(&namespace, &resource.name_any()), resource.clone());
        resource
    }

    /// Store a Secret directly, as if someone else created it
    pub fn insert_secret(&self, mut secret: Secret) -> Secret {
        if secret.metadata.uid.is_none() {
            secret.metadata.uid = Some(self.uid());
        }
        secret.metadata.resource_version = Some("1".into());
        let namespace = secret.namespace().unwrap_or_default();
        self.secrets
            .lock()
            .unwrap()
            .insert(key(&namespace, &secret.name_any()), secret.clone());
        secret
    }

    pub fn sops_secret(&self, namespace: &str, name: &str) -> Option<SopsSecret> {
        self.sops_secrets
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    /// Secret creates plus replaces
    pub fn secret_writes(&self) -> usize {
        self.creates.load(Ordering::Relaxed) + self.replaces.load(Ordering::Relaxed)
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::Relaxed)
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::Relaxed)
    }

    pub fn fail_get_sops_secret(&self, fail: bool) {
        self.fail_get_sops_secret.store(fail, Ordering::Relaxed);
    }

    pub fn fail_get_secret(&self, fail: bool) {
        self.fail_get_secret.store(fail, Ordering::Relaxed);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::Relaxed);
    }

    pub fn fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::Relaxed);
    }

    /// Delay every Secret read and write
    pub fn set_secret_latency(&self, latency: Duration) {
        *self.secret_latency.lock().unwrap() = Some(latency);
    }

    async fn secret_delay(&self) {
        let latency = *self.secret_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn bump(version: Option<&str>) -> String {
    let current: u64 = version.and_then(|v| v.parse().ok()).unwrap_or(0);
    (current + 1).to_string()
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_sops_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<SopsSecret>, StoreError> {
        if self.fail_get_sops_secret.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("get sopssecret rejected".into()));
        }
        Ok(self.sops_secret(namespace, name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.secret_delay().await;
        if self.fail_get_secret.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("get secret rejected".into()));
        }
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.secret_delay().await;
        if self.fail_create.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("create rejected".into()));
        }
        let k = key(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&k) {
            return Err(StoreError::Unavailable(format!("secret {} already exists", k.1)));
        }
        let mut created = secret.clone();
        created.metadata.uid = Some(self.uid());
        created.metadata.resource_version = Some("1".into());
        secrets.insert(k, created.clone());
        self.creates.fetch_add(1, Ordering::Relaxed);
        Ok(created)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.secret_delay().await;
        if self.fail_replace.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("replace rejected".into()));
        }
        let k = key(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        let stored = secrets
            .get(&k)
            .ok_or_else(|| StoreError::Unavailable(format!("secret {} not found", k.1)))?;
        if secret.metadata.resource_version.is_some()
            && secret.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(StoreError::Unavailable("resourceVersion conflict".into()));
        }
        let mut replaced = secret.clone();
        replaced.metadata.resource_version = Some(bump(stored.metadata.resource_version.as_deref()));
        secrets.insert(k, replaced.clone());
        self.replaces.fetch_add(1, Ordering::Relaxed);
        Ok(replaced)
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SopsSecretStatus,
    ) -> Result<(), StoreError> {
        let mut resources = self.sops_secrets.lock().unwrap();
        let resource = resources
            .get_mut(&key(namespace, name))
            .ok_or_else(|| StoreError::Unavailable(format!("sopssecret {name} not found")))?;
        resource.status = Some(status.clone());
        self.status_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Plaintext SopsSecret in [`NAMESPACE`]
pub fn sops_secret(name: &str, templates: Vec<SecretTemplate>) -> SopsSecret {
    let mut resource = SopsSecret::new(
        name,
        SopsSecretSpec {
            secret_templates: templates,
            ..SopsSecretSpec::default()
        },
    );
    resource.metadata.namespace = Some(NAMESPACE.to_owned());
    resource
}

pub fn string_data_template(name: &str, entries: &[(&str, &str)]) -> SecretTemplate {
    SecretTemplate {
        name: name.to_owned(),
        string_data: Some(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        ),
        ..SecretTemplate::default()
    }
}

/// Encrypt a plaintext SopsSecret to `identity` the way `sops --encrypt` would
///
/// `metadata` supplies the selection policy and any extra key slots; the age slot is
/// appended after them.
pub fn encrypt_with(
    resource: &SopsSecret,
    identity: &age::x25519::Identity,
    mut metadata: SopsMetadata,
) -> SopsSecret {
    let key = DataKey::generate();
    metadata
        .age
        .push(wrap_data_key(&identity.to_public(), &key).unwrap());
    metadata.version = Some("3.9.0".into());

    let mut document = serde_json::to_value(resource).unwrap();
    document.as_object_mut().unwrap().remove("sops");
    encrypt_document(&mut document, &key, &mut metadata).unwrap();

    let mut encrypted: SopsSecret = serde_json::from_value(document).unwrap();
    encrypted.sops = Some(metadata);
    encrypted
}

/// Encrypt every string under `spec` to `identity`
pub fn encrypt(resource: &SopsSecret, identity: &age::x25519::Identity) -> SopsSecret {
    encrypt_with(resource, identity, SopsMetadata::default())
}

pub fn key_services(identity: &age::x25519::Identity) -> Arc<KeyServices> {
    Arc::new(KeyServices::default().with_age_identities([identity.clone()]))
}

pub fn reconciler(
    store: &Arc<InMemoryStore>,
    services: Arc<KeyServices>,
    config: ControllerConfig,
) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(
        Arc::clone(store) as Arc<dyn ObjectStore>,
        services,
        Arc::new(config),
    ))
}

/// Secret created outside the controller
pub fn foreign_secret(name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(NAMESPACE.to_owned()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| {
                    (
                        (*k).to_owned(),
                        k8s_openapi::ByteString(v.as_bytes().to_vec()),
                    )
                })
                .collect(),
        ),
        type_: Some("Opaque".into()),
        ..Secret::default()
    }
}

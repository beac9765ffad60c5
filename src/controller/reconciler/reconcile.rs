//! # Reconcile
//!
//! One reconcile cycle for a SopsSecret:
//!
//! 1. Fetch the resource (gone → done, no requeue)
//! 2. Suspended → "Reconciliation is suspended"
//! 3. Decrypt → "Decryption error" on failure
//! 4. Per template, in order, stopping at the first failure:
//!    synthesize, attach owner reference, create when missing, check ownership,
//!    replace when the content differs
//! 5. "Healthy"
//!
//! The status is only written when it changes. Every API call runs under the store
//! deadline; when it expires the cycle ends with an error and no status is written.

use crate::constants::ADOPTION_ANNOTATION;
use crate::controller::decryption::decode;
use crate::controller::reconciler::status::SopsSecretStatusMessage;
use crate::controller::reconciler::store::StoreError;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::controller::synthesizer::{synthesize, SynthesisError};
use crate::crd::{SecretTemplate, SopsSecret, SopsSecretStatus};
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, field, info, info_span, warn, Instrument};

/// A store call ran past its deadline
#[derive(Debug, Clone, Copy)]
struct Elapsed {
    operation: &'static str,
}

impl From<Elapsed> for ReconcilerError {
    fn from(e: Elapsed) -> Self {
        Self::DeadlineExceeded {
            operation: e.operation,
        }
    }
}

/// Failure while applying one secret template
#[derive(Debug, Error)]
enum TemplateError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error("SopsSecret has no uid or name to own the secret")]
    OwnerReference,
    #[error("failed to look up secret: {0}")]
    Lookup(#[source] StoreError),
    #[error("failed to create secret: {0}")]
    Create(#[source] StoreError),
    #[error("secret {name} is neither owned by this SopsSecret nor annotated sopssecret/managed=true")]
    NotOwned { name: String },
    #[error("failed to update secret: {0}")]
    Update(#[source] StoreError),
    #[error("deadline exceeded during {}", .0.operation)]
    Cancelled(Elapsed),
}

impl From<Elapsed> for TemplateError {
    fn from(e: Elapsed) -> Self {
        Self::Cancelled(e)
    }
}

impl TemplateError {
    fn status(&self) -> SopsSecretStatusMessage {
        match self {
            Self::Synthesis(_) => SopsSecretStatusMessage::ChildCreationError,
            Self::OwnerReference => SopsSecretStatusMessage::SettingOwnershipError,
            Self::Lookup(_) | Self::Create(_) | Self::Cancelled(_) => {
                SopsSecretStatusMessage::UnknownError
            }
            Self::NotOwned { .. } => SopsSecretStatusMessage::ChildNotOwned,
            Self::Update(_) => SopsSecretStatusMessage::ChildUpdateError,
        }
    }
}

/// Entry point for the kube-runtime controller
pub async fn reconcile(
    resource: Arc<SopsSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = resource.namespace().ok_or(ReconcilerError::MissingNamespace)?;
    let name = resource.name_any();

    let outcome = ctx.reconcile_resource(&namespace, &name).await?;

    if let Ok(mut states) = ctx.backoff_states.lock() {
        states.remove(&format!("{namespace}/{name}"));
    }
    Ok(outcome.requeue.into())
}

impl Reconciler {
    /// Run one reconcile cycle for the SopsSecret `namespace/name`
    pub async fn reconcile_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!(
            "reconcile",
            resource.namespace = %namespace,
            resource.name = %name,
            status = field::Empty,
        );
        let span_clone = span.clone();

        async move {
            let Some(resource) = self
                .bounded("get sopssecret", self.store.get_sops_secret(namespace, name))
                .await??
            else {
                debug!("SopsSecret not found, nothing to do");
                return Ok(ReconcileOutcome::gone());
            };

            let status = self.synchronize(&resource).await?;
            span_clone.record("status", status.as_str());
            record_outcome(status);
            self.persist_status(&resource, status).await;

            Ok(ReconcileOutcome {
                status: Some(status),
                requeue: self.requeue_for(status),
            })
        }
        .instrument(span)
        .await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Result<T, StoreError>, Elapsed> {
        tokio::time::timeout(self.config.store_timeout(), call)
            .await
            .map_err(|_| Elapsed { operation })
    }

    async fn synchronize(
        &self,
        resource: &SopsSecret,
    ) -> Result<SopsSecretStatusMessage, ReconcilerError> {
        if resource.spec.suspend {
            info!("Reconciliation is suspended");
            return Ok(SopsSecretStatusMessage::Suspended);
        }

        let plaintext = match decode(resource, &self.key_services).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                metrics::increment_decryption_failures();
                debug!("Decryption failed: {}", e);
                return Ok(SopsSecretStatusMessage::DecryptionError);
            }
        };

        for template in &plaintext.spec.secret_templates {
            match self.apply_template(&plaintext, template).await {
                Ok(()) => {}
                Err(TemplateError::Cancelled(elapsed)) => return Err(elapsed.into()),
                Err(e) => {
                    warn!(template = %template.name, "Failed to apply secret template: {}", e);
                    return Ok(e.status());
                }
            }
        }

        info!(
            templates = plaintext.spec.secret_templates.len(),
            "SopsSecret reconciled"
        );
        Ok(SopsSecretStatusMessage::Healthy)
    }

    async fn apply_template(
        &self,
        resource: &SopsSecret,
        template: &SecretTemplate,
    ) -> Result<(), TemplateError> {
        let mut desired = synthesize(resource, template)?;
        let owner = resource
            .controller_owner_ref(&())
            .ok_or(TemplateError::OwnerReference)?;
        desired.metadata.owner_references = Some(vec![owner.clone()]);
        let namespace = desired.namespace().unwrap_or_default();

        let existing = self
            .bounded("get secret", self.store.get_secret(&namespace, &template.name))
            .await?
            .map_err(TemplateError::Lookup)?;
        let current = match existing {
            Some(current) => current,
            None => {
                let created = self
                    .bounded("create secret", self.store.create_secret(&desired))
                    .await?
                    .map_err(TemplateError::Create)?;
                metrics::increment_child_secret_writes("create");
                info!(secret = %template.name, "Created secret");
                created
            }
        };

        let controlled = is_controlled_by(&current, &owner);
        if !controlled && !is_adoptable(&current) {
            return Err(TemplateError::NotOwned {
                name: template.name.clone(),
            });
        }

        let mut updated = current.clone();
        updated.data = desired.data;
        updated.string_data = None;
        updated.type_ = desired.type_;
        updated.metadata.labels = desired.metadata.labels;
        updated.metadata.annotations = desired.metadata.annotations;
        if !controlled {
            let mut references: Vec<OwnerReference> = current
                .owner_references()
                .iter()
                .filter(|r| r.controller != Some(true))
                .cloned()
                .collect();
            references.push(owner);
            updated.metadata.owner_references = Some(references);
            info!(secret = %template.name, "Adopting annotated secret");
        }

        if same_content(&current, &updated) {
            debug!(secret = %template.name, "Secret is up to date");
            return Ok(());
        }

        self.bounded("replace secret", self.store.replace_secret(&updated))
            .await?
            .map_err(TemplateError::Update)?;
        metrics::increment_child_secret_writes("update");
        info!(secret = %template.name, "Updated secret");
        Ok(())
    }

    async fn persist_status(&self, resource: &SopsSecret, status: SopsSecretStatusMessage) {
        let current = resource
            .status_message()
            .and_then(SopsSecretStatusMessage::parse);
        if current == Some(status) {
            debug!("Status unchanged, skipping write");
            return;
        }

        let namespace = resource.namespace().unwrap_or_default();
        let update = SopsSecretStatus {
            message: Some(status.as_str().to_owned()),
        };
        match self
            .bounded(
                "update status",
                self.store
                    .update_status(&namespace, &resource.name_any(), &update),
            )
            .await
        {
            Ok(Ok(())) => debug!(status = status.as_str(), "Updated status"),
            Ok(Err(e)) => warn!("Failed to update status: {}", e),
            Err(elapsed) => warn!("Failed to update status: deadline exceeded during {}", elapsed.operation),
        }
    }
}

fn record_outcome(status: SopsSecretStatusMessage) {
    if status.is_failure() {
        metrics::increment_reconciliation_failures();
    } else if status == SopsSecretStatusMessage::Suspended {
        metrics::increment_reconciliation_suspends();
    } else {
        metrics::increment_reconciliation_successes();
    }
}

/// The secret has a controller owner reference pointing at `owner`
fn is_controlled_by(secret: &Secret, owner: &OwnerReference) -> bool {
    secret
        .owner_references()
        .iter()
        .any(|r| r.controller == Some(true) && r.uid == owner.uid)
}

fn is_adoptable(secret: &Secret) -> bool {
    secret
        .annotations()
        .get(ADOPTION_ANNOTATION)
        .is_some_and(|v| v == "true")
}

/// Compare the fields the controller manages, treating absent and empty alike
fn same_content(a: &Secret, b: &Secret) -> bool {
    fn map<V: Clone>(m: Option<&BTreeMap<String, V>>) -> BTreeMap<String, V> {
        m.cloned().unwrap_or_default()
    }
    fn secret_type(s: &Secret) -> &str {
        s.type_
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(crate::constants::DEFAULT_SECRET_TYPE)
    }

    map(a.data.as_ref()) == map(b.data.as_ref())
        && secret_type(a) == secret_type(b)
        && map(a.metadata.labels.as_ref()) == map(b.metadata.labels.as_ref())
        && map(a.metadata.annotations.as_ref()) == map(b.metadata.annotations.as_ref())
        && a.owner_references() == b.owner_references()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;

    fn owner(uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "isindir.github.com/v1alpha3".into(),
            kind: "SopsSecret".into(),
            name: "example".into(),
            uid: uid.into(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn test_absent_and_empty_compare_equal() {
        let a = Secret {
            data: None,
            type_: None,
            ..Secret::default()
        };
        let b = Secret {
            data: Some(BTreeMap::new()),
            type_: Some("Opaque".into()),
            metadata: ObjectMeta {
                labels: Some(BTreeMap::new()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        assert!(same_content(&a, &b));

        let c = Secret {
            data: Some(BTreeMap::from([("k".into(), ByteString(b"v".to_vec()))])),
            ..Secret::default()
        };
        assert!(!same_content(&a, &c));
    }

    #[test]
    fn test_controlled_requires_controller_flag_and_uid() {
        let mut secret = Secret::default();
        secret.metadata.owner_references = Some(vec![owner("uid-1")]);
        assert!(is_controlled_by(&secret, &owner("uid-1")));
        assert!(!is_controlled_by(&secret, &owner("uid-2")));

        let mut plain_ref = owner("uid-1");
        plain_ref.controller = None;
        secret.metadata.owner_references = Some(vec![plain_ref]);
        assert!(!is_controlled_by(&secret, &owner("uid-1")));
    }

    #[test]
    fn test_adoption_annotation_is_case_sensitive() {
        let mut secret = Secret::default();
        secret.metadata.annotations = Some(BTreeMap::from([(
            ADOPTION_ANNOTATION.to_owned(),
            "True".to_owned(),
        )]));
        assert!(!is_adoptable(&secret));
        secret.metadata.annotations = Some(BTreeMap::from([(
            ADOPTION_ANNOTATION.to_owned(),
            "true".to_owned(),
        )]));
        assert!(is_adoptable(&secret));
    }

    #[test]
    fn test_template_error_statuses() {
        assert_eq!(
            TemplateError::from(SynthesisError::EmptyName).status(),
            SopsSecretStatusMessage::ChildCreationError
        );
        assert_eq!(
            TemplateError::OwnerReference.status(),
            SopsSecretStatusMessage::SettingOwnershipError
        );
        assert_eq!(
            TemplateError::Create(StoreError::Unavailable("down".into())).status(),
            SopsSecretStatusMessage::UnknownError
        );
        assert_eq!(
            TemplateError::NotOwned { name: "x".into() }.status(),
            SopsSecretStatusMessage::ChildNotOwned
        );
        assert_eq!(
            TemplateError::Update(StoreError::Unavailable("conflict".into())).status(),
            SopsSecretStatusMessage::ChildUpdateError
        );
    }
}

//! # SopsSecret Spec
//!
//! The `SopsSecret` resource and its spec types.
//!
//! The SOPS metadata block lives at the top level of the resource, next to `spec`,
//! which the `CustomResource` derive cannot express. The resource type is therefore
//! written out by hand and implements [`kube::Resource`] directly.

use crate::crd::{SopsMetadata, SopsSecretStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// API group of the SopsSecret resource
pub const GROUP: &str = "isindir.github.com";
/// Served version of the SopsSecret resource
pub const VERSION: &str = "v1alpha3";
/// Kind of the SopsSecret resource
pub const KIND: &str = "SopsSecret";
/// Plural resource name used in API paths
pub const PLURAL: &str = "sopssecrets";

/// SopsSecret Custom Resource
///
/// A set of Kubernetes Secret templates whose values are encrypted with SOPS.
///
/// # Example
///
/// ```yaml
/// apiVersion: isindir.github.com/v1alpha3
/// kind: SopsSecret
/// metadata:
///   name: example-sopssecret
///   namespace: default
/// spec:
///   secretTemplates:
///     - name: ENC[AES256_GCM,data:...,type:str]
///       stringData:
///         token: ENC[AES256_GCM,data:...,type:str]
/// sops:
///   age:
///     - recipient: age1...
///       enc: |
///         -----BEGIN AGE ENCRYPTED FILE-----
///         ...
///   lastmodified: "2024-01-01T00:00:00Z"
///   mac: ENC[AES256_GCM,data:...,type:str]
///   encrypted_suffix: Templates
///   version: 3.9.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SopsSecret {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: SopsSecretSpec,
    /// SOPS encryption metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sops: Option<SopsMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SopsSecretStatus>,
}

impl SopsSecret {
    /// Create a resource with the given name and spec, no metadata block and no status
    #[must_use]
    pub fn new(name: &str, spec: SopsSecretSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            spec,
            sops: None,
            status: None,
        }
    }

    /// Current status message, if one has been written
    pub fn status_message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.message.as_deref())
    }
}

impl kube::Resource for SopsSecret {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// SopsSecret spec
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SopsSecretSpec {
    /// Secret templates, one Kubernetes Secret per template
    /// Processed in declaration order
    pub secret_templates: Vec<SecretTemplate>,
    /// Suspend reconciliation of this SopsSecret
    /// Existing Secrets are left untouched while suspended
    #[serde(default = "default_false", skip_serializing_if = "is_false")]
    pub suspend: bool,
    /// Require `namespace` to equal the SopsSecret's own namespace
    /// Must be used together with `namespace`
    #[serde(
        default = "default_false",
        rename = "enforce_namespace",
        alias = "enforceNamespace",
        skip_serializing_if = "is_false"
    )]
    pub enforce_namespace: bool,
    /// Namespace the Secrets are expected to be created in
    /// Only checked when `enforce_namespace` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Template for one Kubernetes Secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    /// Name of the Kubernetes Secret (required, unique within the SopsSecret)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Kubernetes Secret type
    /// Defaults to `Opaque` when empty or absent, any other value is passed through
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Base64 encoded values
    /// Applied after `stringData`, so a key present in both takes this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    /// Plain text values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_data: Option<BTreeMap<String, String>>,
}

pub fn default_false() -> bool {
    false
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature")]
fn is_false(value: &bool) -> bool {
    !*value
}

fn default_api_version() -> String {
    format!("{GROUP}/{VERSION}")
}

fn default_kind() -> String {
    KIND.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_resource_identity() {
        assert_eq!(SopsSecret::api_version(&()), "isindir.github.com/v1alpha3");
        assert_eq!(SopsSecret::kind(&()), "SopsSecret");
        assert_eq!(
            SopsSecret::url_path(&(), Some("default")),
            "/apis/isindir.github.com/v1alpha3/namespaces/default/sopssecrets"
        );
    }

    #[test]
    fn test_enforce_namespace_accepts_both_spellings() {
        let snake: SopsSecretSpec = serde_json::from_value(serde_json::json!({
            "secretTemplates": [],
            "enforce_namespace": true,
            "namespace": "team-a"
        }))
        .unwrap();
        let camel: SopsSecretSpec = serde_json::from_value(serde_json::json!({
            "secretTemplates": [],
            "enforceNamespace": true,
            "namespace": "team-a"
        }))
        .unwrap();
        assert!(snake.enforce_namespace);
        assert_eq!(snake, camel);
    }

    #[test]
    fn test_sops_block_is_top_level() {
        let resource: SopsSecret = serde_json::from_value(serde_json::json!({
            "apiVersion": "isindir.github.com/v1alpha3",
            "kind": "SopsSecret",
            "metadata": {"name": "example", "namespace": "default"},
            "spec": {"secretTemplates": [{"name": "a", "type": "kubernetes.io/tls"}]},
            "sops": {"lastmodified": "2024-01-01T00:00:00Z", "encrypted_suffix": "Templates"}
        }))
        .unwrap();

        let sops = resource.sops.as_ref().unwrap();
        assert_eq!(sops.encrypted_suffix.as_deref(), Some("Templates"));
        assert_eq!(
            resource.spec.secret_templates[0].type_.as_deref(),
            Some("kubernetes.io/tls")
        );

        let value = serde_json::to_value(&resource).unwrap();
        assert!(value.get("sops").is_some());
        assert!(value.get("status").is_none());
        assert!(value["spec"].get("suspend").is_none());
    }
}

//! # Secret Synthesizer
//!
//! Builds the Kubernetes Secret described by one template of a decrypted SopsSecret.
//! Pure: no API calls, no owner references (the reconciler attaches those).

use crate::constants::DEFAULT_SECRET_TYPE;
use crate::crd::{SecretTemplate, SopsSecret};
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use thiserror::Error;

/// A template that cannot be turned into a Secret
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("secret template name must be specified and not empty string")]
    EmptyName,
    #[error("secret template enforced namespace must be the same as the sopssecret namespace")]
    NamespaceMismatch,
    #[error("data[{key}] is not a valid base64 string")]
    InvalidBase64 { key: String },
}

/// Build the Secret for `template`
///
/// `stringData` is applied first and `data` (base64 decoded) second, so `data` wins
/// for keys present in both. The Secret lands in the SopsSecret's namespace.
pub fn synthesize(resource: &SopsSecret, template: &SecretTemplate) -> Result<Secret, SynthesisError> {
    if template.name.is_empty() {
        return Err(SynthesisError::EmptyName);
    }

    let namespace = resource.namespace();
    if resource.spec.enforce_namespace && resource.spec.namespace != namespace {
        return Err(SynthesisError::NamespaceMismatch);
    }

    let mut data: BTreeMap<String, ByteString> = BTreeMap::new();
    for (key, value) in template.string_data.iter().flatten() {
        data.insert(key.clone(), ByteString(value.as_bytes().to_vec()));
    }
    for (key, value) in template.data.iter().flatten() {
        data.insert(key.clone(), ByteString(decode_base64(key, value)?));
    }

    let type_ = template
        .type_
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_SECRET_TYPE)
        .to_owned();

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(template.name.clone()),
            namespace,
            labels: template.labels.clone(),
            annotations: template.annotations.clone(),
            ..ObjectMeta::default()
        },
        data: Some(data),
        type_: Some(type_),
        ..Secret::default()
    })
}

/// Decode a `data` value; line breaks from wrapped base64 are ignored
fn decode_base64(key: &str, value: &str) -> Result<Vec<u8>, SynthesisError> {
    let compact: String = value.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| SynthesisError::InvalidBase64 {
            key: key.to_owned(),
        })
}

//! # Resource Decoder
//!
//! Turns an encrypted SopsSecret into its plaintext form.

use crate::controller::decryption::error::DecodeError;
use crate::controller::decryption::keys::{recover_data_key, KeyServices};
use crate::controller::decryption::tree::decrypt_document;
use crate::crd::SopsSecret;
use crate::observability::metrics;
use kube::ResourceExt;
use std::time::Instant;
use tracing::{debug, field, info_span, warn, Instrument};

/// Decrypt a SopsSecret
///
/// The resource is serialized to JSON, the data key is recovered from its `sops` block,
/// every selected leaf is decrypted and the MAC verified, and the result is read back as
/// a SopsSecret. The returned resource keeps its `sops` block untouched.
///
/// Nothing decrypted is returned unless the whole document authenticated.
pub async fn decode(
    resource: &SopsSecret,
    services: &KeyServices,
) -> Result<SopsSecret, DecodeError> {
    let span = info_span!(
        "sops.decode",
        resource.name = %resource.name_any(),
        resource.namespace = %resource.namespace().unwrap_or_default(),
        key_slots = field::Empty,
        error.reason = field::Empty,
    );
    let span_clone = span.clone();
    let start = Instant::now();

    async move {
        let result = decode_inner(resource, services, &span_clone).await;
        metrics::observe_decryption_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => debug!("Decrypted SopsSecret"),
            Err(e) => {
                let reason = e.reason();
                span_clone.record("error.reason", reason.as_str());
                warn!(
                    reason = reason.as_str(),
                    transient = reason.is_transient(),
                    "Failed to decrypt SopsSecret: {}. {}",
                    e,
                    reason.remediation()
                );
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn decode_inner(
    resource: &SopsSecret,
    services: &KeyServices,
    span: &tracing::Span,
) -> Result<SopsSecret, DecodeError> {
    let metadata = resource.sops.as_ref().ok_or(DecodeError::MissingMetadata)?;
    span.record("key_slots", metadata.key_slot_count());

    let bytes = serde_json::to_vec(resource)?;
    let key = recover_data_key(metadata, services).await?;

    let mut document: serde_json::Value = serde_json::from_slice(&bytes)?;
    let sops = document
        .as_object_mut()
        .and_then(|object| object.remove("sops"));
    decrypt_document(&mut document, &key, metadata)?;
    if let (Some(object), Some(sops)) = (document.as_object_mut(), sops) {
        object.insert("sops".to_owned(), sops);
    }

    Ok(serde_json::from_value(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SopsSecretSpec;

    #[tokio::test]
    async fn test_resource_without_sops_block_is_missing_metadata() {
        let resource = SopsSecret::new("plain", SopsSecretSpec::default());
        let err = decode(&resource, &KeyServices::default()).await.unwrap_err();
        assert!(matches!(err, DecodeError::MissingMetadata));
    }
}

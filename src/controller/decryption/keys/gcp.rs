//! # GCP KMS Key Slots
//!
//! Uses the Cloud KMS REST API (`{resource_id}:decrypt`). The bearer token comes from
//! `GOOGLE_OAUTH_ACCESS_TOKEN` or, on GKE/GCE, from the metadata server.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::services::GCE_METADATA_TOKEN_URL;
use crate::controller::decryption::keys::{DataKey, KeySlot, KeyServices};
use crate::crd::GcpKmsDataItem;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use zeroize::Zeroizing;

const PROVIDER: &str = "gcp_kms";

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[async_trait]
impl KeySlot for GcpKmsDataItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.resource_id
    }

    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError> {
        let token = access_token(services).await?;
        let url = format!(
            "{}/v1/{}:decrypt",
            services.gcp_kms_endpoint(),
            self.resource_id.trim_matches('/')
        );

        let response = services
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "ciphertext": self.enc }))
            .send()
            .await
            .map_err(|e| service_error(format!("request to Cloud KMS failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeySlotError::Unwrap {
                provider: PROVIDER,
                message: format!("Cloud KMS decrypt returned {status}: {}", body.trim()),
            });
        }

        let body: DecryptResponse = response
            .json()
            .await
            .map_err(|e| service_error(format!("unexpected Cloud KMS response: {e}")))?;
        let plaintext = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(body.plaintext.as_bytes())
                .map_err(|e| service_error(format!("Cloud KMS plaintext is not base64: {e}")))?,
        );
        DataKey::from_slice(PROVIDER, &plaintext)
    }
}

async fn access_token(services: &KeyServices) -> Result<String, KeySlotError> {
    if let Some(token) = &services.gcp_access_token {
        return Ok(token.clone());
    }

    let response = services
        .http
        .get(GCE_METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| KeySlotError::MissingCredentials {
            provider: PROVIDER,
            message: format!(
                "GOOGLE_OAUTH_ACCESS_TOKEN not set and metadata server unreachable: {e}"
            ),
        })?;
    if !response.status().is_success() {
        return Err(KeySlotError::MissingCredentials {
            provider: PROVIDER,
            message: format!("metadata server returned {}", response.status()),
        });
    }
    let token: MetadataToken = response
        .json()
        .await
        .map_err(|e| service_error(format!("unexpected metadata server response: {e}")))?;
    Ok(token.access_token)
}

fn service_error(message: String) -> KeySlotError {
    KeySlotError::Service {
        provider: PROVIDER,
        message,
    }
}

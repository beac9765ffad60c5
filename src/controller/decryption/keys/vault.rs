//! # HashiCorp Vault Key Slots
//!
//! The data key is wrapped by a Vault transit key. Decrypting goes through
//! `POST {vault_address}/v1/{engine_path}/decrypt/{key_name}`; transit returns the
//! base64 of the data key.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::{DataKey, KeySlot, KeyServices};
use crate::crd::HcVaultItem;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use zeroize::Zeroizing;

const PROVIDER: &str = "hc_vault";

#[derive(Deserialize)]
struct TransitDecryptResponse {
    data: TransitDecryptData,
}

#[derive(Deserialize)]
struct TransitDecryptData {
    plaintext: String,
}

impl HcVaultItem {
    fn decrypt_url(&self) -> String {
        format!(
            "{}/v1/{}/decrypt/{}",
            self.vault_address.trim_end_matches('/'),
            self.engine_path.trim_matches('/'),
            self.key_name
        )
    }
}

#[async_trait]
impl KeySlot for HcVaultItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.key_name
    }

    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError> {
        let token = services
            .vault_token
            .as_deref()
            .ok_or_else(|| KeySlotError::MissingCredentials {
                provider: PROVIDER,
                message: "no Vault token (set VAULT_TOKEN)".into(),
            })?;

        let response = services
            .http
            .post(self.decrypt_url())
            .header("X-Vault-Token", token)
            .json(&serde_json::json!({ "ciphertext": self.enc }))
            .send()
            .await
            .map_err(|e| service_error(format!("request to {} failed: {e}", self.vault_address)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeySlotError::Unwrap {
                provider: PROVIDER,
                message: format!("transit decrypt returned {status}: {}", body.trim()),
            });
        }

        let body: TransitDecryptResponse = response
            .json()
            .await
            .map_err(|e| service_error(format!("unexpected transit response: {e}")))?;
        let plaintext = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(body.data.plaintext.as_bytes())
                .map_err(|e| service_error(format!("transit plaintext is not base64: {e}")))?,
        );
        DataKey::from_slice(PROVIDER, &plaintext)
    }
}

fn service_error(message: String) -> KeySlotError {
    KeySlotError::Service {
        provider: PROVIDER,
        message,
    }
}

//! # Azure Key Vault Key Slots
//!
//! The data key is wrapped with an RSA key in Key Vault (`RSA-OAEP-256`) and stored
//! as unpadded base64url. Unwrapping calls the Key Vault `unwrapkey` operation.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::{AzureCredentials, DataKey, KeySlot, KeyServices};
use crate::crd::AzureKmsItem;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use zeroize::Zeroizing;

const PROVIDER: &str = "azure_kv";
const API_VERSION: &str = "7.4";
const VAULT_SCOPE: &str = "https://vault.azure.net/.default";

#[derive(Deserialize)]
struct KeyOperationResult {
    value: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl AzureKmsItem {
    fn unwrap_url(&self) -> String {
        format!(
            "{}/keys/{}/{}/unwrapkey?api-version={API_VERSION}",
            self.vault_url.trim_end_matches('/'),
            self.name,
            self.version
        )
    }
}

#[async_trait]
impl KeySlot for AzureKmsItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.name
    }

    async fn unwrap_data_key(&self, services: &KeyServices) -> Result<DataKey, KeySlotError> {
        let token = access_token(services).await?;
        let response = services
            .http
            .post(self.unwrap_url())
            .bearer_auth(token)
            .json(&serde_json::json!({ "alg": "RSA-OAEP-256", "value": self.enc }))
            .send()
            .await
            .map_err(|e| service_error(format!("request to {} failed: {e}", self.vault_url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeySlotError::Unwrap {
                provider: PROVIDER,
                message: format!("unwrapkey returned {status}: {}", body.trim()),
            });
        }

        let result: KeyOperationResult = response
            .json()
            .await
            .map_err(|e| service_error(format!("unexpected unwrapkey response: {e}")))?;
        let plaintext = Zeroizing::new(
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(result.value.trim_end_matches('=').as_bytes())
                .map_err(|e| service_error(format!("unwrapped key is not base64url: {e}")))?,
        );
        DataKey::from_slice(PROVIDER, &plaintext)
    }
}

async fn access_token(services: &KeyServices) -> Result<String, KeySlotError> {
    match &services.azure {
        AzureCredentials::None => Err(KeySlotError::MissingCredentials {
            provider: PROVIDER,
            message: "set AZURE_ACCESS_TOKEN or AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET".into(),
        }),
        AzureCredentials::AccessToken(token) => Ok(token.clone()),
        AzureCredentials::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        } => {
            let url = format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token");
            let response = services
                .http
                .post(url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", VAULT_SCOPE),
                ])
                .send()
                .await
                .map_err(|e| service_error(format!("token request failed: {e}")))?;
            if !response.status().is_success() {
                return Err(KeySlotError::MissingCredentials {
                    provider: PROVIDER,
                    message: format!("token endpoint returned {}", response.status()),
                });
            }
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| service_error(format!("unexpected token response: {e}")))?;
            Ok(token.access_token)
        }
    }
}

fn service_error(message: String) -> KeySlotError {
    KeySlotError::Service {
        provider: PROVIDER,
        message,
    }
}

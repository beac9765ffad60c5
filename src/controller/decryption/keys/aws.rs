//! # AWS KMS Key Slots
//!
//! Credentials come from the default AWS provider chain (IRSA on EKS, environment,
//! instance profile). When a slot names a `role`, it is assumed through STS before
//! calling KMS. The region is taken from the key ARN.

use crate::controller::decryption::error::KeySlotError;
use crate::controller::decryption::keys::{DataKey, KeySlot, KeyServices};
use crate::crd::KmsDataItem;
use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use base64::Engine;
use tracing::debug;

const PROVIDER: &str = "kms";
const ROLE_SESSION_NAME: &str = "sops-secrets-controller";

/// Extract the region from a KMS key ARN (`arn:aws:kms:<region>:<account>:key/<id>`)
fn region_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("arn"), Some(_), Some("kms"), Some(region)) if !region.is_empty() => Some(region),
        _ => None,
    }
}

impl KmsDataItem {
    async fn client(&self) -> Result<aws_sdk_kms::Client, KeySlotError> {
        let region = region_from_arn(&self.arn).ok_or_else(|| KeySlotError::Unwrap {
            provider: PROVIDER,
            message: format!("cannot determine region from key ARN '{}'", self.arn),
        })?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));
        if let Some(profile) = self.aws_profile.as_deref().filter(|p| !p.is_empty()) {
            loader = loader.profile_name(profile);
        }
        let base = loader.load().await;

        let mut config = aws_sdk_kms::config::Builder::from(&base);
        if let Some(role) = self.role.as_deref().filter(|r| !r.is_empty()) {
            debug!(role = %role, "Assuming role for KMS key slot");
            let provider = AssumeRoleProvider::builder(role)
                .session_name(ROLE_SESSION_NAME)
                .configure(&base)
                .build()
                .await;
            config = config.credentials_provider(provider);
        }
        Ok(aws_sdk_kms::Client::from_conf(config.build()))
    }
}

#[async_trait]
impl KeySlot for KmsDataItem {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn key_id(&self) -> &str {
        &self.arn
    }

    async fn unwrap_data_key(&self, _services: &KeyServices) -> Result<DataKey, KeySlotError> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(self.enc.as_bytes())
            .map_err(|e| KeySlotError::Unwrap {
                provider: PROVIDER,
                message: format!("ciphertext blob is not base64: {e}"),
            })?;

        let client = self.client().await?;
        let mut request = client
            .decrypt()
            .ciphertext_blob(Blob::new(ciphertext))
            .key_id(&self.arn);
        for (key, value) in self.context.iter().flatten() {
            request = request.encryption_context(key, value);
        }

        let output = request.send().await.map_err(|e| KeySlotError::Service {
            provider: PROVIDER,
            message: DisplayErrorContext(&e).to_string(),
        })?;
        let plaintext = output.plaintext().ok_or_else(|| KeySlotError::Unwrap {
            provider: PROVIDER,
            message: "KMS returned no plaintext".into(),
        })?;
        DataKey::from_slice(PROVIDER, plaintext.as_ref())
    }
}

//! # Key Services
//!
//! Credentials and clients the key slots use to unwrap data keys.
//!
//! Loaded once at startup from the same environment variables the `sops` CLI reads.

use crate::controller::decryption::keys::age::load_identities;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default Google Cloud KMS API endpoint
pub const DEFAULT_GCP_KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com";

/// GCE metadata server token endpoint, used when no access token is configured
pub const GCE_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How the controller authenticates against Azure Key Vault
#[derive(Clone, Default)]
pub enum AzureCredentials {
    #[default]
    None,
    /// A ready-made bearer token for `https://vault.azure.net`
    AccessToken(String),
    /// Service principal client credentials flow
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Self::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Credentials and HTTP client shared by all key slots
#[derive(Default)]
pub struct KeyServices {
    pub(crate) http: reqwest::Client,
    pub(crate) age_identities: Vec<age::x25519::Identity>,
    pub(crate) vault_token: Option<String>,
    pub(crate) gcp_access_token: Option<String>,
    pub(crate) gcp_kms_endpoint: Option<String>,
    pub(crate) azure: AzureCredentials,
    pub(crate) gnupg_home: Option<PathBuf>,
}

impl fmt::Debug for KeyServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyServices")
            .field("age_identities", &self.age_identities.len())
            .field("vault_token", &self.vault_token.is_some())
            .field("gcp_access_token", &self.gcp_access_token.is_some())
            .field("gcp_kms_endpoint", &self.gcp_kms_endpoint)
            .field("azure", &self.azure)
            .field("gnupg_home", &self.gnupg_home)
            .finish_non_exhaustive()
    }
}

impl KeyServices {
    /// Load credentials from the environment
    ///
    /// - `SOPS_AGE_KEY` / `SOPS_AGE_KEY_FILE` (falling back to `~/.config/sops/age/keys.txt`)
    /// - `VAULT_TOKEN` (falling back to `~/.vault-token`)
    /// - `GOOGLE_OAUTH_ACCESS_TOKEN`, `GCP_KMS_ENDPOINT`
    /// - `AZURE_ACCESS_TOKEN` or `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET`
    /// - `GNUPGHOME`
    ///
    /// AWS KMS slots use the AWS SDK default credential chain and need nothing here.
    pub fn from_env() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for key services")?;

        let mut age_identities = Vec::new();
        if let Some(inline) = non_empty_env("SOPS_AGE_KEY") {
            age_identities.extend(
                load_identities(&inline)
                    .map_err(anyhow::Error::msg)
                    .context("Failed to parse SOPS_AGE_KEY")?,
            );
        }
        let key_file = non_empty_env("SOPS_AGE_KEY_FILE")
            .map(PathBuf::from)
            .or_else(default_age_key_file);
        if let Some(path) = key_file {
            age_identities.extend(read_age_key_file(&path)?);
        }

        let vault_token = non_empty_env("VAULT_TOKEN").or_else(|| {
            home_dir()
                .map(|home| home.join(".vault-token"))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
        });

        let azure = match (
            non_empty_env("AZURE_ACCESS_TOKEN"),
            non_empty_env("AZURE_TENANT_ID"),
            non_empty_env("AZURE_CLIENT_ID"),
            non_empty_env("AZURE_CLIENT_SECRET"),
        ) {
            (Some(token), ..) => AzureCredentials::AccessToken(token),
            (None, Some(tenant_id), Some(client_id), Some(client_secret)) => {
                AzureCredentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                }
            }
            _ => AzureCredentials::None,
        };

        let services = Self {
            http,
            age_identities,
            vault_token,
            gcp_access_token: non_empty_env("GOOGLE_OAUTH_ACCESS_TOKEN"),
            gcp_kms_endpoint: non_empty_env("GCP_KMS_ENDPOINT"),
            azure,
            gnupg_home: non_empty_env("GNUPGHOME").map(PathBuf::from),
        };
        info!(
            age_identities = services.age_identities.len(),
            vault_token = services.vault_token.is_some(),
            gcp_access_token = services.gcp_access_token.is_some(),
            azure = !matches!(services.azure, AzureCredentials::None),
            "Loaded key service credentials"
        );
        Ok(services)
    }

    /// Add age identities
    #[must_use]
    pub fn with_age_identities(
        mut self,
        identities: impl IntoIterator<Item = age::x25519::Identity>,
    ) -> Self {
        self.age_identities.extend(identities);
        self
    }

    /// Set the Vault token
    #[must_use]
    pub fn with_vault_token(mut self, token: impl Into<String>) -> Self {
        self.vault_token = Some(token.into());
        self
    }

    /// Set a GCP access token and optionally a non-default KMS endpoint
    #[must_use]
    pub fn with_gcp_access_token(
        mut self,
        token: impl Into<String>,
        endpoint: Option<String>,
    ) -> Self {
        self.gcp_access_token = Some(token.into());
        self.gcp_kms_endpoint = endpoint;
        self
    }

    /// Set Azure Key Vault credentials
    #[must_use]
    pub fn with_azure_credentials(mut self, credentials: AzureCredentials) -> Self {
        self.azure = credentials;
        self
    }

    pub(crate) fn gcp_kms_endpoint(&self) -> &str {
        self.gcp_kms_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_GCP_KMS_ENDPOINT)
            .trim_end_matches('/')
    }
}

fn read_age_key_file(path: &Path) -> Result<Vec<age::x25519::Identity>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read age key file {}", path.display()))?;
    let identities = load_identities(&contents)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to parse age key file {}", path.display()))?;
    debug!(
        "Loaded {} age identities from {}",
        identities.len(),
        path.display()
    );
    Ok(identities)
}

/// `$XDG_CONFIG_HOME/sops/age/keys.txt`, only when the file exists
fn default_age_key_file() -> Option<PathBuf> {
    let config_dir = non_empty_env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".config")))?;
    let path = config_dir.join("sops").join("age").join("keys.txt");
    path.is_file().then_some(path)
}

fn home_dir() -> Option<PathBuf> {
    non_empty_env("HOME").map(PathBuf::from)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

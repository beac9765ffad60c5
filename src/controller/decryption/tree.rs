//! # SOPS Tree Decryption
//!
//! Decrypts the encrypted leaves of a SOPS document and verifies its MAC.
//!
//! Encrypted leaves use the SOPS format:
//! `ENC[AES256_GCM,data:<b64>,iv:<b64>,tag:<b64>,type:<str|int|float|bool|bytes>]`
//!
//! Each leaf is authenticated with its path as additional data (`spec:secretTemplates:data:key:`),
//! so a value moved to another key fails to decrypt. Only leaves under `spec` take part;
//! `apiVersion`, `kind`, `metadata` and `status` are owned by the cluster and pass through.
//!
//! The MAC is SHA-512 over every leaf under `spec`: the plaintext of encrypted leaves and the
//! stored bytes of the ones left unencrypted (`True`/`False` for bools). Object keys are walked
//! in sorted order and array elements in index order. The MAC is stored encrypted with
//! `lastmodified` as additional data.

use crate::controller::decryption::error::DecodeError;
use crate::controller::decryption::keys::DataKey;
use crate::crd::SopsMetadata;
use aes_gcm::aead::consts::U32;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm};
use base64::Engine;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// AES-256-GCM with the 32-byte IVs SOPS writes
type Aes256Gcm32 = AesGcm<Aes256, U32>;

const CIPHER: &str = "AES256_GCM";
const TAG_LEN: usize = 16;
const SOPS_IV_LEN: usize = 32;
const STANDARD_IV_LEN: usize = 12;

/// Only this top-level key holds encrypted leaves
const ENCRYPTED_ROOT: &str = "spec";

/// Plaintext type recorded in an encrypted leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
    Bytes,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }
}

/// A parsed `ENC[...]` value
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    pub data: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub value_type: ValueType,
}

impl fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedValue")
            .field("data_len", &self.data.len())
            .field("iv_len", &self.iv.len())
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

/// Check whether a string looks like a SOPS encrypted value
pub fn is_encrypted(s: &str) -> bool {
    s.starts_with("ENC[") && s.ends_with(']')
}

impl FromStr for EncryptedValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix("ENC[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| "not an ENC[...] value".to_string())?;

        let mut fields = inner.split(',');
        match fields.next() {
            Some(CIPHER) => {}
            Some(other) => return Err(format!("unsupported cipher '{other}'")),
            None => return Err("empty ENC[] value".into()),
        }

        let (mut data, mut iv, mut tag, mut value_type) = (None, None, None, None);
        for field in fields {
            let (name, content) = field
                .split_once(':')
                .ok_or_else(|| format!("field '{field}' has no value"))?;
            match name {
                "data" => data = Some(decode_b64(name, content)?),
                "iv" => iv = Some(decode_b64(name, content)?),
                "tag" => tag = Some(decode_b64(name, content)?),
                "type" => {
                    value_type = Some(
                        ValueType::parse(content)
                            .ok_or_else(|| format!("unknown value type '{content}'"))?,
                    );
                }
                _ => return Err(format!("unknown field '{name}'")),
            }
        }

        let iv = iv.ok_or("missing iv")?;
        if iv.len() != SOPS_IV_LEN && iv.len() != STANDARD_IV_LEN {
            return Err(format!("iv must be 12 or 32 bytes, got {}", iv.len()));
        }
        let tag = tag.ok_or("missing tag")?;
        if tag.len() != TAG_LEN {
            return Err(format!("tag must be {TAG_LEN} bytes, got {}", tag.len()));
        }
        Ok(Self {
            data: data.ok_or("missing data")?,
            iv,
            tag,
            value_type: value_type.unwrap_or(ValueType::Str),
        })
    }
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = base64::engine::general_purpose::STANDARD;
        write!(
            f,
            "ENC[{CIPHER},data:{},iv:{},tag:{},type:{}]",
            b64.encode(&self.data),
            b64.encode(&self.iv),
            b64.encode(&self.tag),
            self.value_type.as_str()
        )
    }
}

fn decode_b64(field: &str, content: &str) -> Result<Vec<u8>, String> {
    base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| format!("{field} is not valid base64: {e}"))
}

/// Which leaves of the tree are encrypted
#[derive(Debug, Clone)]
pub enum SelectionPolicy {
    /// Every leaf
    All,
    /// Leaves with a path component ending in the suffix
    Suffix(String),
    /// Leaves whose joined path, or one of its components, matches
    Regex(Regex),
}

impl SelectionPolicy {
    /// Build the policy from `encrypted_suffix` / `encrypted_regex`
    pub fn from_metadata(metadata: &SopsMetadata) -> Result<Self, DecodeError> {
        let suffix = metadata.encrypted_suffix.as_deref().filter(|s| !s.is_empty());
        let regex = metadata.encrypted_regex.as_deref().filter(|s| !s.is_empty());
        match (suffix, regex) {
            (Some(_), Some(_)) => Err(DecodeError::InvalidMetadata(
                "encrypted_suffix and encrypted_regex are mutually exclusive".into(),
            )),
            (Some(suffix), None) => Ok(Self::Suffix(suffix.to_owned())),
            (None, Some(pattern)) => Regex::new(pattern).map(Self::Regex).map_err(|e| {
                DecodeError::InvalidMetadata(format!("invalid encrypted_regex '{pattern}': {e}"))
            }),
            (None, None) => Ok(Self::All),
        }
    }

    pub fn selects(&self, path: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Suffix(suffix) => path.iter().any(|c| c.ends_with(suffix.as_str())),
            Self::Regex(re) => {
                re.is_match(&additional_data(path)) || path.iter().any(|c| re.is_match(c))
            }
        }
    }
}

/// Additional data bound to a leaf: path components joined with `:` plus a trailing `:`
fn additional_data(path: &[String]) -> String {
    let mut aad = String::new();
    for component in path {
        aad.push_str(component);
        aad.push(':');
    }
    aad
}

fn open(
    key: &DataKey,
    value: &EncryptedValue,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, aes_gcm::Error> {
    let mut combined = Vec::with_capacity(value.data.len() + TAG_LEN);
    combined.extend_from_slice(&value.data);
    combined.extend_from_slice(&value.tag);
    let payload = Payload {
        msg: &combined,
        aad,
    };
    let key = GenericArray::from_slice(key.as_bytes());

    let plaintext = match value.iv.len() {
        SOPS_IV_LEN => {
            Aes256Gcm32::new(key).decrypt(GenericArray::from_slice(&value.iv), payload)?
        }
        STANDARD_IV_LEN => {
            Aes256Gcm::new(key).decrypt(GenericArray::from_slice(&value.iv), payload)?
        }
        _ => return Err(aes_gcm::Error),
    };
    Ok(Zeroizing::new(plaintext))
}

fn seal(
    key: &DataKey,
    plaintext: &[u8],
    aad: &[u8],
    value_type: ValueType,
) -> Result<EncryptedValue, aes_gcm::Error> {
    let cipher = Aes256Gcm32::new(GenericArray::from_slice(key.as_bytes()));
    let iv = Aes256Gcm32::generate_nonce(&mut OsRng);
    let mut data = cipher.encrypt(
        &iv,
        Payload {
            msg: plaintext,
            aad,
        },
    )?;
    let tag = data.split_off(data.len() - TAG_LEN);
    Ok(EncryptedValue {
        data,
        iv: iv.to_vec(),
        tag,
        value_type,
    })
}

/// Turn decrypted plaintext back into a JSON value of its recorded type
fn retype(plaintext: &[u8], value_type: ValueType, path: &str) -> Result<Value, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedValue {
        path: path.to_owned(),
        reason,
    };
    let text = std::str::from_utf8(plaintext)
        .map_err(|e| malformed(format!("plaintext is not UTF-8: {e}")))?;

    match value_type {
        ValueType::Str | ValueType::Bytes => Ok(Value::String(text.to_owned())),
        ValueType::Int => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| malformed(format!("'int' plaintext does not parse: {e}"))),
        ValueType::Float => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| malformed("'float' plaintext does not parse".into())),
        ValueType::Bool => match text {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            other => Err(malformed(format!("'{other}' is not a bool"))),
        },
    }
}

/// Feed a leaf that is stored in plaintext into the MAC, in the byte form SOPS uses
fn hash_plain_leaf(mac: &mut Sha512, leaf: &Value) {
    match leaf {
        Value::String(s) => mac.update(s.as_bytes()),
        Value::Bool(true) => mac.update(b"True"),
        Value::Bool(false) => mac.update(b"False"),
        Value::Number(n) => mac.update(n.to_string().as_bytes()),
        _ => {}
    }
}

struct DecryptWalk<'a> {
    key: &'a DataKey,
    policy: &'a SelectionPolicy,
    mac: Sha512,
}

impl DecryptWalk<'_> {
    fn visit(&mut self, value: &mut Value, path: &mut Vec<String>) -> Result<(), DecodeError> {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort_unstable();
                for key in keys {
                    if let Some(child) = map.get_mut(&key) {
                        path.push(key);
                        self.visit(child, path)?;
                        path.pop();
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, path)?;
                }
            }
            Value::String(s) if !s.is_empty() && self.policy.selects(path) => {
                let aad = additional_data(path);
                let encrypted =
                    s.parse::<EncryptedValue>()
                        .map_err(|reason| DecodeError::MalformedValue {
                            path: aad.clone(),
                            reason,
                        })?;
                let plaintext = open(self.key, &encrypted, aad.as_bytes()).map_err(|_| {
                    DecodeError::AuthenticationFailed(format!("value at '{aad}' did not authenticate"))
                })?;
                self.mac.update(plaintext.as_slice());
                *value = retype(&plaintext, encrypted.value_type, &aad)?;
            }
            leaf => hash_plain_leaf(&mut self.mac, leaf),
        }
        Ok(())
    }
}

/// Decrypt a document (without its `sops` block) in place and verify the MAC
///
/// On error the document may be partially decrypted; callers must drop it.
pub fn decrypt_document(
    document: &mut Value,
    key: &DataKey,
    metadata: &SopsMetadata,
) -> Result<(), DecodeError> {
    let policy = SelectionPolicy::from_metadata(metadata)?;
    let mut walk = DecryptWalk {
        key,
        policy: &policy,
        mac: Sha512::new(),
    };
    if let Some(root) = document.get_mut(ENCRYPTED_ROOT) {
        walk.visit(root, &mut vec![ENCRYPTED_ROOT.to_owned()])?;
    }
    let computed = hex::encode_upper(walk.mac.finalize());
    verify_mac(&computed, key, metadata)
}

fn verify_mac(computed: &str, key: &DataKey, metadata: &SopsMetadata) -> Result<(), DecodeError> {
    let stored = metadata
        .mac
        .as_deref()
        .ok_or_else(|| DecodeError::AuthenticationFailed("sops metadata has no mac".into()))?;
    let encrypted = stored.parse::<EncryptedValue>().map_err(|reason| {
        DecodeError::AuthenticationFailed(format!("stored mac is malformed: {reason}"))
    })?;
    let lastmodified = metadata.lastmodified.as_deref().unwrap_or_default();
    let plaintext = open(key, &encrypted, lastmodified.as_bytes()).map_err(|_| {
        DecodeError::AuthenticationFailed("stored mac did not authenticate".into())
    })?;

    if plaintext.as_slice().eq_ignore_ascii_case(computed.as_bytes()) {
        Ok(())
    } else {
        Err(DecodeError::AuthenticationFailed(
            "mac does not match the decrypted values".into(),
        ))
    }
}

struct EncryptWalk<'a> {
    key: &'a DataKey,
    policy: &'a SelectionPolicy,
    mac: Sha512,
}

impl EncryptWalk<'_> {
    fn visit(&mut self, value: &mut Value, path: &mut Vec<String>) -> Result<(), DecodeError> {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort_unstable();
                for key in keys {
                    if let Some(child) = map.get_mut(&key) {
                        path.push(key);
                        self.visit(child, path)?;
                        path.pop();
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, path)?;
                }
            }
            // Typed fields (suspend, enforce_namespace) stay plaintext so the resource
            // still deserializes
            Value::String(s) if !s.is_empty() && self.policy.selects(path) => {
                let aad = additional_data(path);
                let sealed = seal(self.key, s.as_bytes(), aad.as_bytes(), ValueType::Str)
                    .map_err(|_| encrypt_failed(&aad))?;
                self.mac.update(s.as_bytes());
                *s = sealed.to_string();
            }
            leaf => hash_plain_leaf(&mut self.mac, leaf),
        }
        Ok(())
    }
}

fn encrypt_failed(path: &str) -> DecodeError {
    DecodeError::MalformedValue {
        path: path.to_owned(),
        reason: "encryption failed".into(),
    }
}

/// Encrypt a document (without its `sops` block) in place
///
/// Selected string leaves under `spec` are encrypted; `lastmodified` and `mac` are set on
/// `metadata`.
pub fn encrypt_document(
    document: &mut Value,
    key: &DataKey,
    metadata: &mut SopsMetadata,
) -> Result<(), DecodeError> {
    let policy = SelectionPolicy::from_metadata(metadata)?;
    let mut walk = EncryptWalk {
        key,
        policy: &policy,
        mac: Sha512::new(),
    };
    if let Some(root) = document.get_mut(ENCRYPTED_ROOT) {
        walk.visit(root, &mut vec![ENCRYPTED_ROOT.to_owned()])?;
    }

    let lastmodified = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let mac = hex::encode_upper(walk.mac.finalize());
    let sealed = seal(key, mac.as_bytes(), lastmodified.as_bytes(), ValueType::Str)
        .map_err(|_| encrypt_failed("sops:mac:"))?;
    metadata.mac = Some(sealed.to_string());
    metadata.lastmodified = Some(lastmodified);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "apiVersion": "isindir.github.com/v1alpha3",
            "kind": "SopsSecret",
            "metadata": { "name": "example", "namespace": "default" },
            "spec": {
                "secretTemplates": [{
                    "name": "app-credentials",
                    "stringData": { "password": "hunter2", "username": "admin" }
                }],
                "suspend": false
            }
        })
    }

    fn roundtrip(mut metadata: SopsMetadata) -> (Value, Value, DataKey, SopsMetadata) {
        let key = DataKey::generate();
        let plain = document();
        let mut encrypted = plain.clone();
        encrypt_document(&mut encrypted, &key, &mut metadata).unwrap();
        (plain, encrypted, key, metadata)
    }

    #[test]
    fn test_parse_and_format_encrypted_value() {
        let raw = "ENC[AES256_GCM,data:aGVsbG8=,iv:AAAAAAAAAAAAAAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==,type:int]";
        let value: EncryptedValue = raw.parse().unwrap();
        assert_eq!(value.data, b"hello");
        assert_eq!(value.iv.len(), 12);
        assert_eq!(value.value_type, ValueType::Int);
        assert_eq!(value.to_string(), raw);
    }

    #[test]
    fn test_parse_rejects_other_ciphers_and_bad_iv() {
        assert!("ENC[AES128_CBC,data:aGk=,iv:AAAA,tag:AAAA,type:str]"
            .parse::<EncryptedValue>()
            .unwrap_err()
            .contains("unsupported cipher"));
        assert!("ENC[AES256_GCM,data:aGk=,iv:AAAA,tag:AAAAAAAAAAAAAAAAAAAAAA==,type:str]"
            .parse::<EncryptedValue>()
            .unwrap_err()
            .contains("iv must be"));
        assert!("plain".parse::<EncryptedValue>().is_err());
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_document() {
        let (plain, mut encrypted, key, metadata) = roundtrip(SopsMetadata::default());
        let password = &encrypted["spec"]["secretTemplates"][0]["stringData"]["password"];
        assert!(is_encrypted(password.as_str().unwrap()));
        assert_eq!(encrypted["metadata"], plain["metadata"]);
        assert_eq!(encrypted["spec"]["suspend"], json!(false));

        decrypt_document(&mut encrypted, &key, &metadata).unwrap();
        assert_eq!(encrypted, plain);
    }

    #[test]
    fn test_suffix_policy_leaves_other_values_verbatim() {
        let metadata = SopsMetadata {
            encrypted_suffix: Some("Data".into()),
            ..SopsMetadata::default()
        };
        let (plain, mut encrypted, key, metadata) = roundtrip(metadata);
        assert_eq!(
            encrypted["spec"]["secretTemplates"][0]["name"],
            json!("app-credentials")
        );
        assert!(is_encrypted(
            encrypted["spec"]["secretTemplates"][0]["stringData"]["username"]
                .as_str()
                .unwrap()
        ));

        decrypt_document(&mut encrypted, &key, &metadata).unwrap();
        assert_eq!(encrypted, plain);
    }

    #[test]
    fn test_unencrypted_leaf_is_covered_by_mac() {
        let metadata = SopsMetadata {
            encrypted_suffix: Some("Data".into()),
            ..SopsMetadata::default()
        };
        let (_, encrypted, key, metadata) = roundtrip(metadata);

        let mut renamed = encrypted.clone();
        renamed["spec"]["secretTemplates"][0]["name"] = json!("someone-elses-secret");
        let err = decrypt_document(&mut renamed, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));

        let mut retyped = encrypted.clone();
        retyped["spec"]["secretTemplates"][0]["type"] = json!("kubernetes.io/service-account-token");
        let err = decrypt_document(&mut retyped, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));

        let mut resumed = encrypted;
        resumed["spec"]["suspend"] = json!(true);
        let err = decrypt_document(&mut resumed, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_regex_policy_matches_components() {
        let policy = SelectionPolicy::Regex(Regex::new("^(data|stringData)$").unwrap());
        let path: Vec<String> = ["spec", "secretTemplates", "stringData", "password"]
            .map(String::from)
            .to_vec();
        assert!(policy.selects(&path));
        assert!(!policy.selects(&["spec".to_owned(), "secretTemplates".to_owned(), "name".to_owned()]));
    }

    #[test]
    fn test_both_policies_is_invalid_metadata() {
        let metadata = SopsMetadata {
            encrypted_suffix: Some("_secret".into()),
            encrypted_regex: Some("^data$".into()),
            ..SopsMetadata::default()
        };
        assert!(matches!(
            SelectionPolicy::from_metadata(&metadata),
            Err(DecodeError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_tampered_value_fails_authentication() {
        let (_, mut encrypted, key, metadata) = roundtrip(SopsMetadata::default());
        let leaf = &mut encrypted["spec"]["secretTemplates"][0]["stringData"]["password"];
        let mut value: EncryptedValue = leaf.as_str().unwrap().parse().unwrap();
        value.data[0] ^= 0x01;
        *leaf = Value::String(value.to_string());

        let err = decrypt_document(&mut encrypted, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_value_moved_to_other_key_fails_authentication() {
        let (_, mut encrypted, key, metadata) = roundtrip(SopsMetadata::default());
        let data = &mut encrypted["spec"]["secretTemplates"][0]["stringData"];
        let password = data["password"].clone();
        data["username"] = password;

        let err = decrypt_document(&mut encrypted, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_missing_or_wrong_mac_fails() {
        let (_, encrypted, key, metadata) = roundtrip(SopsMetadata::default());

        let mut without_mac = metadata.clone();
        without_mac.mac = None;
        let err = decrypt_document(&mut encrypted.clone(), &key, &without_mac).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));

        let mut other_timestamp = metadata;
        other_timestamp.lastmodified = Some("2020-01-01T00:00:00Z".into());
        let err = decrypt_document(&mut encrypted.clone(), &key, &other_timestamp).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_removed_value_fails_mac() {
        let (_, mut encrypted, key, metadata) = roundtrip(SopsMetadata::default());
        encrypted["spec"]["secretTemplates"][0]["stringData"]
            .as_object_mut()
            .unwrap()
            .remove("username");
        let err = decrypt_document(&mut encrypted, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_plaintext_leaf_under_policy_is_malformed() {
        let (_, mut encrypted, key, metadata) = roundtrip(SopsMetadata::default());
        encrypted["spec"]["secretTemplates"][0]["stringData"]["username"] = json!("admin");
        let err = decrypt_document(&mut encrypted, &key, &metadata).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedValue { .. }));
    }

    #[test]
    fn test_typed_values_and_standard_iv() {
        let key = DataKey::generate();
        let aad = "spec:replicas:";
        let mut document = json!({ "spec": { "replicas": "", "enabled": "" } });

        let replicas = seal(&key, b"3", aad.as_bytes(), ValueType::Int).unwrap();
        document["spec"]["replicas"] = Value::String(replicas.to_string());

        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        let iv = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut data = cipher
            .encrypt(&iv, Payload { msg: b"True", aad: b"spec:enabled:" })
            .unwrap();
        let tag = data.split_off(data.len() - TAG_LEN);
        let enabled = EncryptedValue {
            data,
            iv: iv.to_vec(),
            tag,
            value_type: ValueType::Bool,
        };
        document["spec"]["enabled"] = Value::String(enabled.to_string());

        // sorted order: enabled, replicas
        let mut mac = Sha512::new();
        mac.update(b"True");
        mac.update(b"3");
        let lastmodified = "2024-05-01T10:00:00Z";
        let sealed_mac = seal(
            &key,
            hex::encode_upper(mac.finalize()).as_bytes(),
            lastmodified.as_bytes(),
            ValueType::Str,
        )
        .unwrap();
        let metadata = SopsMetadata {
            mac: Some(sealed_mac.to_string()),
            lastmodified: Some(lastmodified.into()),
            ..SopsMetadata::default()
        };

        decrypt_document(&mut document, &key, &metadata).unwrap();
        assert_eq!(document, json!({ "spec": { "replicas": 3, "enabled": true } }));
    }
}

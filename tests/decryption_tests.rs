//! # SOPS Decryption Tests
//!
//! Decoding of SopsSecrets encrypted to throwaway age identities.
//!
//! These tests verify:
//! - Any one working key slot is enough to recover the data key
//! - Wrong identities and tampered documents are rejected as a whole
//! - Selective encryption (`encrypted_suffix`, `encrypted_regex`)

mod common;

use common::{encrypt, encrypt_with, sops_secret, string_data_template};
use sops_secrets_controller::controller::decryption::keys::wrap_data_key;
use sops_secrets_controller::controller::decryption::{
    decode, is_encrypted, DataKey, DecodeError, DecodeFailureReason, KeyServices,
};
use sops_secrets_controller::crd::{HcVaultItem, SopsMetadata, SopsSecret};

fn resource() -> SopsSecret {
    sops_secret(
        "example",
        vec![
            string_data_template("app-credentials", &[("username", "admin"), ("password", "hunter2")]),
            string_data_template("api", &[("token", "t0ken")]),
        ],
    )
}

fn services(identity: &age::x25519::Identity) -> KeyServices {
    KeyServices::default().with_age_identities([identity.clone()])
}

#[tokio::test]
async fn test_decode_restores_plaintext() {
    let identity = age::x25519::Identity::generate();
    let plaintext = resource();
    let encrypted = encrypt(&plaintext, &identity);

    let template = &encrypted.spec.secret_templates[0];
    assert!(is_encrypted(&template.name));
    assert!(template
        .string_data
        .as_ref()
        .unwrap()
        .values()
        .all(|v| is_encrypted(v)));

    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, plaintext.spec);
    assert_eq!(decoded.metadata, plaintext.metadata);
    assert_eq!(decoded.sops, encrypted.sops);
}

#[tokio::test]
async fn test_unreachable_slot_falls_through_to_age() {
    let identity = age::x25519::Identity::generate();
    let vault_slot = HcVaultItem {
        vault_address: "http://127.0.0.1:1".into(),
        engine_path: "sops".into(),
        key_name: "firstkey".into(),
        enc: "vault:v1:bm90LWEta2V5".into(),
        ..HcVaultItem::default()
    };
    let metadata = SopsMetadata {
        hc_vault: vec![vault_slot],
        ..SopsMetadata::default()
    };
    let encrypted = encrypt_with(&resource(), &identity, metadata);

    // No Vault token is configured, so the Vault slot fails before the age slot is tried
    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, resource().spec);
}

#[tokio::test]
async fn test_any_age_slot_position_recovers_the_key() {
    let identity = age::x25519::Identity::generate();
    let stranger = age::x25519::Identity::generate().to_public();
    // Wraps an unrelated data key to a recipient this controller holds no identity for
    let foreign_slot = || wrap_data_key(&stranger, &DataKey::generate()).unwrap();

    // Working slot first, unusable slot after it
    let mut encrypted = encrypt(&resource(), &identity);
    if let Some(sops) = encrypted.sops.as_mut() {
        sops.age.push(foreign_slot());
    }
    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, resource().spec);

    // Unusable slot first, working slot after it
    let metadata = SopsMetadata {
        age: vec![foreign_slot()],
        ..SopsMetadata::default()
    };
    let encrypted = encrypt_with(&resource(), &identity, metadata);
    assert_eq!(encrypted.sops.as_ref().unwrap().age.len(), 2);
    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, resource().spec);
}

#[tokio::test]
async fn test_wrong_identity_is_key_recovery_failure() {
    let identity = age::x25519::Identity::generate();
    let stranger = age::x25519::Identity::generate();
    let encrypted = encrypt(&resource(), &identity);

    let err = decode(&encrypted, &services(&stranger)).await.unwrap_err();

    assert_eq!(err.reason(), DecodeFailureReason::KeyRecovery);
    match err {
        DecodeError::KeyRecovery(e) => {
            assert_eq!(e.attempted, 1);
            assert_eq!(e.last.unwrap().provider(), "age");
        }
        other => panic!("expected key recovery failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_swapped_values_fail_authentication() {
    let identity = age::x25519::Identity::generate();
    let mut encrypted = encrypt(&resource(), &identity);

    // Move a ciphertext to another key: its additional data no longer matches
    let string_data = encrypted.spec.secret_templates[0]
        .string_data
        .as_mut()
        .unwrap();
    let password = string_data["password"].clone();
    string_data.insert("username".to_owned(), password);

    let err = decode(&encrypted, &services(&identity)).await.unwrap_err();
    assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_removed_value_fails_mac() {
    let identity = age::x25519::Identity::generate();
    let mut encrypted = encrypt(&resource(), &identity);
    encrypted.spec.secret_templates.pop();

    let err = decode(&encrypted, &services(&identity)).await.unwrap_err();
    assert!(matches!(err, DecodeError::AuthenticationFailed(_)));
    assert_eq!(err.reason(), DecodeFailureReason::Authentication);
}

#[tokio::test]
async fn test_encrypted_suffix_leaves_other_values_plain() {
    let identity = age::x25519::Identity::generate();
    let metadata = SopsMetadata {
        encrypted_suffix: Some("Data".into()),
        ..SopsMetadata::default()
    };
    let encrypted = encrypt_with(&resource(), &identity, metadata);

    let template = &encrypted.spec.secret_templates[0];
    assert_eq!(template.name, "app-credentials");
    assert!(is_encrypted(&template.string_data.as_ref().unwrap()["password"]));

    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, resource().spec);
}

#[tokio::test]
async fn test_encrypted_regex_selects_matching_keys() {
    let identity = age::x25519::Identity::generate();
    let metadata = SopsMetadata {
        encrypted_regex: Some("^(password|token)$".into()),
        ..SopsMetadata::default()
    };
    let encrypted = encrypt_with(&resource(), &identity, metadata);

    let string_data = encrypted.spec.secret_templates[0].string_data.as_ref().unwrap();
    assert_eq!(string_data["username"], "admin");
    assert!(is_encrypted(&string_data["password"]));

    let decoded = decode(&encrypted, &services(&identity)).await.unwrap();
    assert_eq!(decoded.spec, resource().spec);
}

#[tokio::test]
async fn test_suffix_and_regex_together_are_invalid() {
    let identity = age::x25519::Identity::generate();
    let mut encrypted = encrypt(&resource(), &identity);
    if let Some(sops) = encrypted.sops.as_mut() {
        sops.encrypted_suffix = Some("Data".into());
        sops.encrypted_regex = Some("^password$".into());
    }

    let err = decode(&encrypted, &services(&identity)).await.unwrap_err();
    assert!(matches!(err, DecodeError::InvalidMetadata(_)));
    assert_eq!(err.reason(), DecodeFailureReason::Format);
}

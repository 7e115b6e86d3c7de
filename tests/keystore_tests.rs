mod util;

use crypto_wallet::core::domain::PrivateKey;
use crypto_wallet::core::errors::WalletError;
use crypto_wallet::keystore::{EncryptedKeystoreBlob, KeyStore, KeystoreRecord, KEYSTORE_STORAGE_KEY};
use crypto_wallet::storage::{FileKeystoreStorage, KeystoreStorage, MemoryKeystoreStorage};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use util::{light_scrypt, memory_keystore};

// Secret-storage v3 pbkdf2 reference entry (password "testpassword").
const PBKDF2_VECTOR: &str = r#"{
    "crypto": {
        "cipher": "aes-128-ctr",
        "cipherparams": { "iv": "6087dab2f9fdbbfaddc31a909735c1e6" },
        "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
        "kdf": "pbkdf2",
        "kdfparams": {
            "c": 262144,
            "dklen": 32,
            "prf": "hmac-sha256",
            "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
        },
        "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
    },
    "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
    "version": 3
}"#;
const PBKDF2_KEY: &str = "7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

#[test]
fn create_then_unlock_with_same_password() {
    let keystore = memory_keystore();
    assert!(!keystore.exists().unwrap());

    let (wallet, record) = keystore.create("abc123").unwrap();
    assert!(keystore.exists().unwrap());
    assert_eq!(record.len(), 1);
    assert_eq!(record[0].crypto.kdf, "scrypt");
    assert_eq!(record[0].crypto.cipher, "aes-128-ctr");

    let unlocked = keystore.unlock("abc123").unwrap();
    assert_eq!(unlocked.addresses(), wallet.addresses());
}

#[test]
fn wrong_password_is_authentication_error() {
    let keystore = memory_keystore();
    keystore.create("abc123").unwrap();
    assert!(matches!(keystore.unlock("abc124"), Err(WalletError::AuthenticationError(_))));
}

#[test]
fn unlock_without_keystore_is_authentication_error() {
    assert!(matches!(memory_keystore().unlock("abc123"), Err(WalletError::AuthenticationError(_))));
}

#[test]
fn corrupt_record_is_authentication_error_and_create_recovers() {
    let storage = Arc::new(MemoryKeystoreStorage::new());
    let keystore = KeyStore::new(storage.clone(), light_scrypt());
    storage.store(KEYSTORE_STORAGE_KEY, "{not json").unwrap();
    assert!(matches!(keystore.unlock("pw"), Err(WalletError::AuthenticationError(_))));

    let (wallet, _) = keystore.create("pw").unwrap();
    assert_eq!(keystore.unlock("pw").unwrap().addresses(), wallet.addresses());
}

#[test]
fn tampered_ciphertext_fails_mac() {
    let storage = Arc::new(MemoryKeystoreStorage::new());
    let keystore = KeyStore::new(storage.clone(), light_scrypt());
    let (_, mut record) = keystore.create("pw").unwrap();
    record[0].crypto.ciphertext[0] ^= 0x01;
    storage.store(KEYSTORE_STORAGE_KEY, &serde_json::to_string(&record).unwrap()).unwrap();
    assert!(matches!(keystore.unlock("pw"), Err(WalletError::AuthenticationError(_))));
}

#[test]
fn oversized_scrypt_cost_in_record_is_authentication_error() {
    let storage = Arc::new(MemoryKeystoreStorage::new());
    let keystore = KeyStore::new(storage.clone(), light_scrypt());
    let (_, record) = keystore.create("pw").unwrap();

    let corruptions = [
        serde_json::json!({ "n": 1u32 << 20, "r": 1u32 << 16 }),
        serde_json::json!({ "p": 1u32 << 20 }),
        serde_json::json!({ "r": 0 }),
    ];
    for patch in corruptions {
        let mut corrupted = record.clone();
        for (field, value) in patch.as_object().unwrap() {
            corrupted[0].crypto.kdfparams[field] = value.clone();
        }
        storage.store(KEYSTORE_STORAGE_KEY, &serde_json::to_string(&corrupted).unwrap()).unwrap();
        assert!(
            matches!(keystore.unlock("pw"), Err(WalletError::AuthenticationError(_))),
            "{} accepted",
            patch
        );
    }
}

#[test]
fn create_overwrites_previous_keystore() {
    let keystore = memory_keystore();
    let (first, _) = keystore.create("one").unwrap();
    let (second, _) = keystore.create("two").unwrap();
    assert_ne!(first.addresses(), second.addresses());
    assert!(keystore.unlock("one").is_err());
    assert_eq!(keystore.unlock("two").unwrap().addresses(), second.addresses());
}

#[test]
fn multiple_accounts_keep_order() {
    let keystore = memory_keystore();
    let (wallet, record) = keystore.create_with_accounts("pw", 3).unwrap();
    assert_eq!(record.len(), 3);
    assert_eq!(keystore.unlock("pw").unwrap().addresses(), wallet.addresses());
}

#[test]
fn create_rejects_empty_password_and_zero_accounts() {
    let keystore = memory_keystore();
    assert!(matches!(keystore.create(""), Err(WalletError::ValidationError(_))));
    assert!(matches!(keystore.create_with_accounts("pw", 0), Err(WalletError::ValidationError(_))));
    assert!(!keystore.exists().unwrap());
}

#[test]
fn unlocks_pbkdf2_reference_entry() {
    let blob: EncryptedKeystoreBlob = serde_json::from_str(PBKDF2_VECTOR).unwrap();
    let record: KeystoreRecord = vec![blob];

    let wallet = KeyStore::unlock_record(&record, "testpassword").unwrap();
    let expected = PrivateKey::try_from_slice(&hex::decode(PBKDF2_KEY).unwrap())
        .unwrap()
        .address()
        .unwrap();
    assert_eq!(wallet.addresses(), vec![expected]);

    assert!(matches!(
        KeyStore::unlock_record(&record, "testpassword!"),
        Err(WalletError::AuthenticationError(_))
    ));
}

#[test]
fn mismatched_stored_address_is_rejected() {
    let keystore = memory_keystore();
    let (_, mut record) = keystore.create("pw").unwrap();
    record[0].address = Some("0000000000000000000000000000000000000001".into());
    assert!(matches!(
        KeyStore::unlock_record(&record, "pw"),
        Err(WalletError::AuthenticationError(_))
    ));
}

#[test]
fn duplicate_entries_are_rejected() {
    let keystore = memory_keystore();
    let (_, record) = keystore.create("pw").unwrap();
    let doubled: KeystoreRecord = vec![record[0].clone(), record[0].clone()];
    assert!(matches!(
        KeyStore::unlock_record(&doubled, "pw"),
        Err(WalletError::AuthenticationError(_))
    ));
}

#[test]
fn file_storage_survives_new_keystore_instance() {
    let dir = TempDir::new().unwrap();
    let created = {
        let keystore = KeyStore::new(Arc::new(FileKeystoreStorage::new(dir.path())), light_scrypt());
        keystore.create("abc123").unwrap().0.addresses()
    };

    let path = dir.path().join(format!("{}.json", KEYSTORE_STORAGE_KEY));
    let persisted: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(persisted.is_array());
    assert_eq!(persisted[0]["version"], 3);
    assert!(persisted[0]["crypto"]["mac"].is_string());

    let reopened = KeyStore::new(Arc::new(FileKeystoreStorage::new(dir.path())), light_scrypt());
    assert!(reopened.exists().unwrap());
    assert_eq!(reopened.unlock("abc123").unwrap().addresses(), created);
}

#[test]
fn persisted_record_never_contains_key_or_password() {
    let storage = Arc::new(MemoryKeystoreStorage::new());
    let keystore = KeyStore::new(storage.clone(), light_scrypt());
    keystore.create("hunter2-password").unwrap();
    let raw = storage.load(KEYSTORE_STORAGE_KEY).unwrap().unwrap();
    assert!(!raw.contains("hunter2-password"));
}

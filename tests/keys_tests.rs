//! Integration-level coverage for `KeyLoader::from_env`, complementing the
//! inline unit tests in `src/keys/mod.rs` that exercise the parsing/dedup
//! logic directly.

use sops_secret_operator::keys::KeyLoader;
use std::env;
use std::sync::Mutex;

// Environment variables are process-global; serialize these tests so they
// don't stomp on each other when run concurrently.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn from_env_reads_inline_key() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        env::set_var("INLINE_KEY", "age1exampleexamplekey");
        env::remove_var("KEY_FILE");
    }

    let loader = KeyLoader::from_env().expect("inline key is sufficient");
    assert_eq!(loader.keys(), &["age1exampleexamplekey".to_string()]);

    unsafe {
        env::remove_var("INLINE_KEY");
    }
}

#[test]
fn from_env_fails_with_neither_source_set() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        env::remove_var("INLINE_KEY");
        env::remove_var("KEY_FILE");
    }

    assert!(KeyLoader::from_env().is_err());
}

#[test]
fn from_env_reads_key_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.txt");
    std::fs::write(&path, "age1filekey\n").unwrap();

    unsafe {
        env::remove_var("INLINE_KEY");
        env::set_var("KEY_FILE", &path);
    }

    let loader = KeyLoader::from_env().expect("key file is sufficient");
    assert_eq!(loader.keys(), &["age1filekey".to_string()]);

    unsafe {
        env::remove_var("KEY_FILE");
    }
}

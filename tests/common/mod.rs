//! Shared fixtures for the integration tests: RSA keypairs and key directories.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use paas_crypt_gateway::crypt::KeyPaths;
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;

pub const TENANT: &str = "paasName";
pub const PLAINTEXT: &str = "My test string";
pub const REPO: &str = "ssh://git@scm/some-repo.git";
/// Valid base64 ("notDecryptable") that is not a ciphertext
pub const NOT_DECRYPTABLE: &str = "bm90RGVjcnlwdGFibGU=";

/// PEM encoded keypair
pub struct KeyPair {
    pub private_pem: String,
    /// SPKI (`PUBLIC KEY`)
    pub public_pem: String,
    /// PKCS#1 (`RSA PUBLIC KEY`), same key as `public_pem`
    pub public_pkcs1_pem: String,
}

fn generate() -> KeyPair {
    let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key");
    let public = key.to_public_key();
    KeyPair {
        private_pem: key.to_pkcs1_pem(LineEnding::LF).expect("encode private key").to_string(),
        public_pem: public.to_public_key_pem(LineEnding::LF).expect("encode public key"),
        public_pkcs1_pem: public.to_pkcs1_pem(LineEnding::LF).expect("encode public key"),
    }
}

pub static KEY_A: LazyLock<KeyPair> = LazyLock::new(generate);
pub static KEY_B: LazyLock<KeyPair> = LazyLock::new(generate);
pub static KEY_C: LazyLock<KeyPair> = LazyLock::new(generate);

/// Temporary directory holding `privateKey` and `publicKey`
pub struct KeyDir {
    pub dir: TempDir,
    pub keys: KeyPaths,
}

impl KeyDir {
    pub fn new(pair: &KeyPair) -> Self {
        let dir = tempfile::tempdir().expect("create key dir");
        let private = dir.path().join("privateKey");
        let public = dir.path().join("publicKey");
        write(&private, &pair.private_pem);
        write(&public, &pair.public_pem);
        Self {
            dir,
            keys: KeyPaths::new(vec![private], public),
        }
    }

    pub fn private_path(&self) -> &Path {
        &self.keys.private_keys()[0]
    }

    pub fn public_path(&self) -> &Path {
        self.keys.public_key()
    }

    /// Replace both key files with `pair`, the way a mounted secret is updated
    pub fn rotate(&self, pair: &KeyPair) {
        replace(self.private_path(), &pair.private_pem);
        replace(self.public_path(), &pair.public_pem);
    }

    /// Path of an additional file in the key directory
    pub fn extra(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        write(&path, contents);
        path
    }
}

pub fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("write key file");
}

/// Write next to `path` and rename over it
pub fn replace(path: &Path, contents: &str) {
    let tmp = path.with_extension("tmp");
    write(&tmp, contents);
    std::fs::rename(&tmp, path).expect("rename key file");
}

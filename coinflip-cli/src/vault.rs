//! Local store for bet secrets, sealed under a passphrase.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use coinflip_core::AccountId;
use coinflip_ledger::{Commitment, Secret, SECRET_LEN};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

const SALT_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const PBKDF2_ROUNDS: u32 = 100_000;
const VAULT_VERSION: u32 = 1;

/// One secret encrypted with ChaCha20Poly1305.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSecret {
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    /// Keyed by `<commitment hex>:<account>`.
    secrets: BTreeMap<String, SealedSecret>,
}

impl Default for VaultFile {
    fn default() -> Self {
        Self {
            version: VAULT_VERSION,
            secrets: BTreeMap::new(),
        }
    }
}

pub struct Vault {
    path: PathBuf,
}

impl Vault {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Seal a new secret. An existing entry for the same bet and account
    /// is never replaced.
    pub async fn store(
        &self,
        commitment: &Commitment,
        account: &AccountId,
        secret: &Secret,
        passphrase: &str,
    ) -> Result<()> {
        let mut file = self.load().await?;
        let key = entry_key(commitment, account);
        if file.secrets.contains_key(&key) {
            bail!(
                "A secret for {} on bet {} is already sealed",
                account,
                commitment
            );
        }

        let sealed = seal(secret, passphrase)?;
        file.secrets.insert(key, sealed);
        self.save(&file).await?;

        tracing::debug!("Sealed secret for {} ({})", commitment.short(), account);
        Ok(())
    }

    pub async fn open(
        &self,
        commitment: &Commitment,
        account: &AccountId,
        passphrase: &str,
    ) -> Result<Secret> {
        let file = self.load().await?;
        let sealed = file
            .secrets
            .get(&entry_key(commitment, account))
            .ok_or_else(|| {
                anyhow!(
                    "No secret stored for {} on bet {}",
                    account,
                    commitment
                )
            })?;
        unseal(sealed, passphrase)
    }

    pub async fn contains(&self, commitment: &Commitment, account: &AccountId) -> Result<bool> {
        let file = self.load().await?;
        Ok(file.secrets.contains_key(&entry_key(commitment, account)))
    }

    /// Drop a secret once its bet has settled.
    pub async fn remove(&self, commitment: &Commitment, account: &AccountId) -> Result<bool> {
        let mut file = self.load().await?;
        let removed = file
            .secrets
            .remove(&entry_key(commitment, account))
            .is_some();
        if removed {
            self.save(&file).await?;
        }
        Ok(removed)
    }

    async fn load(&self) -> Result<VaultFile> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(VaultFile::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading vault {}", self.path.display()))?;
        let file: VaultFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing vault {}", self.path.display()))?;
        if file.version != VAULT_VERSION {
            bail!("Unsupported vault version {}", file.version);
        }
        Ok(file)
    }

    async fn save(&self, file: &VaultFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(file)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("writing vault {}", self.path.display()))?;
        Ok(())
    }
}

fn entry_key(commitment: &Commitment, account: &AccountId) -> String {
    format!("{}:{}", commitment.to_hex(), account)
}

/// Encrypt a secret with a key derived from `passphrase`
pub fn seal(secret: &Secret, passphrase: &str) -> Result<SealedSecret> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let cipher = ChaCha20Poly1305::new(&key);

    let ciphertext = cipher
        .encrypt(&nonce, secret.as_bytes().as_slice())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(SealedSecret {
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce),
        checksum: checksum(&ciphertext),
        ciphertext: STANDARD.encode(ciphertext),
        created_at: Utc::now(),
    })
}

pub fn unseal(sealed: &SealedSecret, passphrase: &str) -> Result<Secret> {
    let salt = STANDARD.decode(&sealed.salt).context("decoding salt")?;
    let nonce = STANDARD.decode(&sealed.nonce).context("decoding nonce")?;
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .context("decoding ciphertext")?;

    if checksum(&ciphertext) != sealed.checksum {
        bail!("Vault entry checksum verification failed");
    }
    if nonce.len() != NONCE_SIZE {
        bail!("Vault entry has a {}-byte nonce", nonce.len());
    }

    let key = derive_key(passphrase, &salt);
    let cipher = ChaCha20Poly1305::new(&key);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| anyhow!("Wrong passphrase or corrupted vault entry"))?;

    let bytes: [u8; SECRET_LEN] = plaintext
        .try_into()
        .map_err(|_| anyhow!("Vault entry does not hold a {}-byte secret", SECRET_LEN))?;
    Ok(Secret::from_bytes(bytes))
}

/// PBKDF2-HMAC-SHA256 key derivation
fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::from_slice(&key)
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_seal_unseal() {
        let secret = Secret::from_u128(0xAAAA);

        let sealed = seal(&secret, "correct horse").unwrap();
        assert_eq!(unseal(&sealed, "correct horse").unwrap(), secret);
    }

    #[test]
    fn test_wrong_passphrase() {
        let sealed = seal(&Secret::from_u128(0xAAAA), "correct horse").unwrap();
        assert!(unseal(&sealed, "battery staple").is_err());
    }

    #[test]
    fn test_tampered_ciphertext() {
        let mut sealed = seal(&Secret::from_u128(1), "pw").unwrap();
        sealed.ciphertext = STANDARD.encode([0u8; 48]);
        assert!(unseal(&sealed, "pw").is_err());
    }

    #[tokio::test]
    async fn test_vault_keeps_secrets_per_account() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.json"));
        let alice = AccountId::new("alice").unwrap();
        let bob = AccountId::new("bob").unwrap();
        let a = Secret::from_u128(0xAAAA);
        let b = Secret::from_u128(0xBBBB);
        let commitment = a.commit();

        vault.store(&commitment, &alice, &a, "pw").await.unwrap();
        vault.store(&commitment, &bob, &b, "pw").await.unwrap();

        assert_eq!(vault.open(&commitment, &alice, "pw").await.unwrap(), a);
        assert_eq!(vault.open(&commitment, &bob, "pw").await.unwrap(), b);
        assert!(vault.open(&commitment, &alice, "nope").await.is_err());

        assert!(vault.remove(&commitment, &alice).await.unwrap());
        assert!(!vault.contains(&commitment, &alice).await.unwrap());
        assert!(vault.open(&commitment, &alice, "pw").await.is_err());
        assert!(vault.contains(&commitment, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_never_replaces_a_sealed_secret() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(dir.path().join("secrets.json"));
        let alice = AccountId::new("alice").unwrap();
        let original = Secret::from_u128(0xAAAA);
        let commitment = original.commit();

        vault.store(&commitment, &alice, &original, "pw").await.unwrap();
        let err = vault
            .store(&commitment, &alice, &Secret::from_u128(0xBBBB), "other")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already sealed"));

        assert_eq!(vault.open(&commitment, &alice, "pw").await.unwrap(), original);
    }
}

//! RSA key material for the login encryption exchange.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::{traits::PublicKeyParts, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// A server key pair. The public half is kept DER-encoded, ready for an
/// EncryptionRequest.
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Generates a new key pair. CPU heavy; run it off the async workers.
    pub fn generate(bits: usize) -> anyhow::Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)?;
        Ok(Self::from_private(private))
    }

    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public_der =
            rsa_der::public_key_to_der(&private.n().to_bytes_be(), &private.e().to_bytes_be());
        Self {
            private,
            public_der,
        }
    }

    pub fn public_der(&self) -> &[u8] {
        &self.public_der
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private.to_public_key()
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, rsa::Error> {
        self.private.decrypt(Pkcs1v15Encrypt, data)
    }
}

/// Something that hands out key pairs for logins. May be slow and may fail.
#[async_trait]
pub trait KeyPairSource: Send + Sync {
    async fn key_pair(&self) -> anyhow::Result<Arc<ServerKeyPair>>;
}

/// Generates RSA keys on the blocking pool, either fresh for every login or
/// once and shared.
pub struct RsaKeyGenerator {
    bits: usize,
    shared: Option<OnceCell<Arc<ServerKeyPair>>>,
}

impl RsaKeyGenerator {
    pub fn new(bits: usize, share: bool) -> Self {
        Self {
            bits,
            shared: share.then(OnceCell::new),
        }
    }

    async fn generate(&self) -> anyhow::Result<Arc<ServerKeyPair>> {
        let bits = self.bits;
        let pair = tokio::task::spawn_blocking(move || ServerKeyPair::generate(bits)).await??;
        Ok(Arc::new(pair))
    }
}

#[async_trait]
impl KeyPairSource for RsaKeyGenerator {
    async fn key_pair(&self) -> anyhow::Result<Arc<ServerKeyPair>> {
        match &self.shared {
            Some(cell) => cell.get_or_try_init(|| self.generate()).await.cloned(),
            None => self.generate().await,
        }
    }
}

/// Offline-mode player id: the first 16 bytes of SHA-256 over the username.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Sha256::digest(username.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

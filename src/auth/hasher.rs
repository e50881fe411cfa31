/// One-way Secret Hashing
///
/// A single hashing contract used for both account passwords and refresh
/// tokens. The bcrypt implementation digests every secret with SHA-256
/// first: bcrypt only reads 72 bytes of input, and signed refresh tokens
/// share a long constant prefix, so hashing them raw would make every
/// token of the same user collide.

use bcrypt::{hash, verify};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::AppError;

/// One-way, salted hash and verify
pub trait SecretHasher: Send + Sync {
    /// Hash a secret. Two calls with the same input yield different digests.
    fn hash(&self, secret: &str) -> Result<String, AppError>;

    /// Check a secret against a digest produced by [`SecretHasher::hash`]
    fn verify(&self, secret: &str, digest: &str) -> Result<bool, AppError>;
}

/// bcrypt over a SHA-256 pre-digest
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

fn pre_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl SecretHasher for BcryptHasher {
    fn hash(&self, secret: &str) -> Result<String, AppError> {
        hash(pre_digest(secret), self.cost)
            .map_err(|e| AppError::Internal(format!("Secret hashing failed: {}", e)))
    }

    fn verify(&self, secret: &str, digest: &str) -> Result<bool, AppError> {
        verify(pre_digest(secret), digest)
            .map_err(|e| AppError::Internal(format!("Secret verification failed: {}", e)))
    }
}

/// Hash on the blocking pool so bcrypt never stalls a request worker
pub async fn hash_in_background(
    hasher: Arc<dyn SecretHasher>,
    secret: String,
) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hasher.hash(&secret)).await?
}

/// Verify on the blocking pool
pub async fn verify_in_background(
    hasher: Arc<dyn SecretHasher>,
    secret: String,
    digest: String,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &digest)).await?
}

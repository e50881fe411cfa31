/// JWT Token Signing and Verification
///
/// One codec type, instantiated once per token class with its own secret
/// and lifetime, so a leaked access secret cannot forge refresh tokens.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::fmt;
use std::marker::PhantomData;

use crate::auth::claims::TokenClaims;
use crate::configuration::TokenSettings;
use crate::error::{AppError, AuthError};

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Authentic but past `exp`; the caller may try renewal
    Expired,
    /// Bad signature, malformed, or from another issuer; never renew
    InvalidSignature,
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::InvalidSignature => write!(f, "Invalid token"),
            TokenError::Signing(msg) => write!(f, "Token generation failed: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Auth(AuthError::TokenExpired),
            TokenError::InvalidSignature => AppError::Auth(AuthError::TokenInvalid),
            TokenError::Signing(msg) => AppError::Internal(msg),
        }
    }
}

/// A freshly signed token with the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken<C> {
    pub token: String,
    pub claims: C,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer/verifier for one class of claims
pub struct TokenCodec<C> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_seconds: i64,
    _claims: PhantomData<fn() -> C>,
}

impl<C: TokenClaims> TokenCodec<C> {
    /// # Arguments
    /// * `settings` - Secret and lifetime for this token class
    /// * `issuer` - Issuer stamped into and required from every token
    pub fn new(settings: &TokenSettings, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            ttl_seconds: settings.ttl_seconds,
            _claims: PhantomData,
        }
    }

    /// Stamp `iss`, `iat` and `exp` onto the claims and sign them
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if encoding fails
    pub fn sign(&self, mut claims: C) -> Result<IssuedToken<C>, TokenError> {
        let issued_at = Utc::now().timestamp();
        let expires_at = issued_at + self.ttl_seconds;
        claims.stamp(&self.issuer, issued_at, expires_at);

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Check signature, issuer and expiry, and return the claims
    ///
    /// The signature is checked before `exp`, so a forged token is always
    /// [`TokenError::InvalidSignature`] even if it is also stale.
    pub fn verify(&self, token: &str) -> Result<C, TokenError> {
        decode::<C>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!("JWT validation error: {}", e);
                    TokenError::InvalidSignature
                }
            })
    }
}

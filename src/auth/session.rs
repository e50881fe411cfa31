/// Session Lifecycle
///
/// Orchestrates the user and refresh stores, the token codecs and the
/// secret hasher:
/// - login establishes a session (access + refresh token, one stored credential)
/// - renewal trades a live refresh token for a new access token, read-only
/// - logout deletes the stored credential
///
/// Refresh tokens are not rotated on use. A captured refresh token stays
/// usable until it expires or the user logs in again or out.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::auth::hasher::{hash_in_background, verify_in_background, SecretHasher};
use crate::auth::identity::Identity;
use crate::auth::jwt::{IssuedToken, TokenCodec, TokenError};
use crate::configuration::AuthSettings;
use crate::domain::{LoginRecord, NewUser, RefreshCredential, Role, User, UserStatus};
use crate::error::{AppError, AuthError};
use crate::store::SessionStore;
use crate::validators::{is_valid_email, is_valid_name, require_password, validate_password_strength};

/// Result of a successful login
#[derive(Debug)]
pub struct LoginOutcome {
    /// The user row after the login bookkeeping was written
    pub user: User,
    pub access: IssuedToken<AccessClaims>,
    pub refresh: IssuedToken<RefreshClaims>,
}

/// Result of a successful renewal
#[derive(Debug)]
pub struct Renewal {
    pub identity: Identity,
    pub access: IssuedToken<AccessClaims>,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    hasher: Arc<dyn SecretHasher>,
    access: TokenCodec<AccessClaims>,
    refresh: TokenCodec<RefreshClaims>,
    /// Verified against when the email is unknown, so both paths cost one bcrypt check
    timing_digest: String,
}

impl SessionManager {
    /// # Errors
    /// Returns error if the hasher cannot produce the timing digest
    pub fn new(
        store: Arc<dyn SessionStore>,
        hasher: Arc<dyn SecretHasher>,
        settings: &AuthSettings,
    ) -> Result<Self, AppError> {
        let timing_digest = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            store,
            hasher,
            access: TokenCodec::new(&settings.access_token, &settings.issuer),
            refresh: TokenCodec::new(&settings.refresh_token, &settings.issuer),
            timing_digest,
        })
    }

    /// Authenticate with email and password and establish a fresh session
    ///
    /// # Errors
    /// - `Validation` for empty or malformed input
    /// - `InvalidCredentials` for an unknown email or a wrong password (same error)
    /// - `AccountInactive` for suspended or pending accounts
    /// - `Database`/`Internal` on storage or hashing failure; nothing is written
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: Option<String>,
    ) -> Result<LoginOutcome, AppError> {
        let email = is_valid_email(email)?;
        require_password(password)?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                verify_in_background(
                    self.hasher.clone(),
                    password.to_string(),
                    self.timing_digest.clone(),
                )
                .await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !user.status.may_authenticate() {
            tracing::warn!(user_id = %user.id, status = ?user.status, "Login refused for inactive account");
            return Err(AuthError::AccountInactive.into());
        }

        let password_valid = verify_in_background(
            self.hasher.clone(),
            password.to_string(),
            user.password_hash.clone(),
        )
        .await?;
        if !password_valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        let access = self.access.sign(AccessClaims::for_user(&user))?;
        let refresh = self.refresh.sign(RefreshClaims::for_user(&user))?;
        let token_hash = hash_in_background(self.hasher.clone(), refresh.token.clone()).await?;

        let now = Utc::now();
        let credential = RefreshCredential {
            user_id: user.id,
            token_hash,
            created_at: now,
            expires_at: refresh.expires_at,
        };
        let user = self
            .store
            .establish_session(credential, LoginRecord { at: now, ip: client_ip })
            .await?;

        Ok(LoginOutcome {
            user,
            access,
            refresh,
        })
    }

    /// Cryptographic and TTL check of an access token; no store access
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.access.verify(token)
    }

    /// Mint a new access token from a refresh token
    ///
    /// Reads the stored credential and the current user row but never
    /// modifies either, so concurrent renewals cannot conflict.
    ///
    /// # Errors
    /// `RefreshExpired` or `RefreshRevoked` (both 403) for every rejection
    pub async fn renew(&self, refresh_token: &str) -> Result<Renewal, AppError> {
        let claims = self.refresh.verify(refresh_token).map_err(|e| match e {
            TokenError::Expired => AuthError::RefreshExpired,
            _ => AuthError::RefreshRevoked,
        })?;

        let stored = match self.store.find_refresh_credential(claims.sub).await? {
            Some(stored) => stored,
            None => {
                tracing::warn!(user_id = %claims.sub, "Renewal with revoked refresh token");
                return Err(AuthError::RefreshRevoked.into());
            }
        };

        if stored.is_expired(Utc::now()) {
            return Err(AuthError::RefreshExpired.into());
        }

        let matches = verify_in_background(
            self.hasher.clone(),
            refresh_token.to_string(),
            stored.token_hash,
        )
        .await?;
        if !matches {
            tracing::warn!(user_id = %claims.sub, "Refresh token does not match stored credential");
            return Err(AuthError::RefreshRevoked.into());
        }

        // Reload so role, name and image changes since login are picked up
        let user = match self.store.find_user_by_id(stored.user_id).await? {
            Some(user) if user.status.may_authenticate() => user,
            Some(user) => {
                tracing::warn!(user_id = %user.id, status = ?user.status, "Renewal refused for inactive account");
                return Err(AuthError::RefreshRevoked.into());
            }
            None => return Err(AuthError::RefreshRevoked.into()),
        };

        let access = self.access.sign(AccessClaims::for_user(&user))?;
        tracing::debug!(user_id = %user.id, "Access token renewed");

        Ok(Renewal {
            identity: Identity::from(access.claims.clone()),
            access,
        })
    }

    /// Revoke the user's session. Repeating it is harmless.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.end_session(user_id).await
    }

    /// Register a new account; it starts Pending until an administrator activates it
    ///
    /// # Errors
    /// - `Validation` for a bad name, email or weak password
    /// - `Database(UniqueConstraintViolation)` when the email is taken
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User, AppError> {
        let name = is_valid_name(name)?;
        let email = is_valid_email(email)?;
        validate_password_strength(password)?;

        let password_hash = hash_in_background(self.hasher.clone(), password.to_string()).await?;

        self.store
            .create_user(NewUser {
                email,
                name,
                password_hash,
                role: Role::Contributor,
                status: UserStatus::Pending,
                image: None,
            })
            .await
    }

    /// Fresh user row for an authenticated identity
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized.into())
    }
}

/// JWT Claims structures
///
/// Payloads of the two token classes. Both carry the standard RFC 7519
/// `iat`, `exp` and `iss` claims, which the token codec stamps at signing.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Role, User};

/// Claims a codec can stamp with issuer and lifetime
pub trait TokenClaims: Serialize + DeserializeOwned {
    fn stamp(&mut self, issuer: &str, issued_at: i64, expires_at: i64);
}

/// Access token payload: the identity attached to each request
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl AccessClaims {
    /// Unstamped claims for a user row
    pub fn for_user(user: &User) -> Self {
        Self {
            sub: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            iat: 0,
            exp: 0,
            iss: String::new(),
        }
    }
}

impl TokenClaims for AccessClaims {
    fn stamp(&mut self, issuer: &str, issued_at: i64, expires_at: i64) {
        self.iss = issuer.to_string();
        self.iat = issued_at;
        self.exp = expires_at;
    }
}

/// Refresh token payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub email: String,
    /// Unique per issue, so two logins in the same second differ
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn for_user(user: &User) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4(),
            iat: 0,
            exp: 0,
            iss: String::new(),
        }
    }
}

impl TokenClaims for RefreshClaims {
    fn stamp(&mut self, issuer: &str, issued_at: i64, expires_at: i64) {
        self.iss = issuer.to_string();
        self.iat = issued_at;
        self.exp = expires_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserStatus;
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            name: "Test User".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Viewer,
            status: UserStatus::Active,
            image: Some("https://cdn.example.com/u.jpg".to_string()),
            last_login_at: None,
            last_login_ip: None,
            login_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_claims_creation() {
        let user = user();
        let mut claims = AccessClaims::for_user(&user);
        claims.stamp("test", 100, 200);

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Viewer);
        assert_eq!(claims.image, user.image);
        assert_eq!((claims.iat, claims.exp), (100, 200));
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_refresh_claims_are_unique_per_issue() {
        let user = user();
        let first = RefreshClaims::for_user(&user);
        let second = RefreshClaims::for_user(&user);

        assert_eq!(first.sub, second.sub);
        assert_ne!(first.jti, second.jti);
    }
}

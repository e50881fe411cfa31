/// Authentication module
///
/// Handles token signing/verification, secret hashing, session cookies,
/// request identity and the session lifecycle (login, renewal, logout).

mod claims;
mod cookies;
mod hasher;
mod identity;
mod jwt;
mod session;

pub use claims::{AccessClaims, RefreshClaims, TokenClaims};
pub use cookies::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use hasher::{hash_in_background, verify_in_background, BcryptHasher, SecretHasher};
pub use identity::{AuthenticatedUser, Identity};
pub use jwt::{IssuedToken, TokenCodec, TokenError};
pub use session::{LoginOutcome, Renewal, SessionManager};

/// Request identity
///
/// The session middleware attaches an [`Identity`] to every request it
/// wraps, anonymous when no session exists. Protected routes take an
/// [`AuthenticatedUser`] instead, which rejects anonymous requests.

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::auth::claims::AccessClaims;
use crate::domain::Role;
use crate::error::{AppError, AuthError};

/// Identity attached by the session middleware; all fields are `None` when anonymous
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub image: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    /// The non-anonymous view of this identity, if any
    pub fn authenticated(&self) -> Option<AuthenticatedUser> {
        match (self.id, &self.email, &self.name, self.role) {
            (Some(id), Some(email), Some(name), Some(role)) => Some(AuthenticatedUser {
                id,
                email: email.clone(),
                name: name.clone(),
                role,
                image: self.image.clone(),
            }),
            _ => None,
        }
    }
}

impl From<AccessClaims> for Identity {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: Some(claims.sub),
            email: Some(claims.email),
            name: Some(claims.name),
            role: Some(claims.role),
            image: claims.image,
        }
    }
}

/// Routes outside the session middleware see an anonymous identity
impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let identity = req.extensions().get::<Identity>().cloned().unwrap_or_default();
        ready(Ok(identity))
    }
}

/// Identity guard: extracting this fails with 401 for anonymous requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub image: Option<String>,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = req
            .extensions()
            .get::<Identity>()
            .and_then(Identity::authenticated);

        match user {
            Some(user) => ready(Ok(user)),
            None => {
                tracing::warn!(path = %req.path(), "Unauthorized access attempt detected");
                ready(Err(AppError::Auth(AuthError::Unauthorized)))
            }
        }
    }
}

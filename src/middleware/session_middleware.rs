/// Session Renewal Middleware
///
/// Resolves the identity of every request it wraps from the `token` and
/// `refreshToken` cookies and injects it into request extensions:
/// - valid access token: its claims become the identity
/// - expired or missing access token with a refresh cookie: renewal, and
///   the new access token is set on the same response
/// - nothing usable: anonymous identity (routes reject through the guard)
///
/// Tampered access tokens are rejected with 401 and never renewed.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{
    CookiePolicy, Identity, Renewal, SessionManager, TokenError, ACCESS_COOKIE, REFRESH_COOKIE,
};
use crate::error::{AppError, AuthError};

/// Session middleware for identity-consuming routes
pub struct SessionMiddleware {
    sessions: web::Data<SessionManager>,
    cookies: CookiePolicy,
}

impl SessionMiddleware {
    pub fn new(sessions: web::Data<SessionManager>, cookies: CookiePolicy) -> Self {
        Self { sessions, cookies }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
            cookies: self.cookies.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    sessions: web::Data<SessionManager>,
    cookies: CookiePolicy,
}

/// Outcome of reading the session cookies
enum Resolution {
    Anonymous,
    Authenticated(Identity),
    Renewed(Renewal),
}

/// Non-empty value of a request cookie
fn cookie_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.cookie(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

async fn resolve_session(
    sessions: &SessionManager,
    access_token: Option<String>,
    refresh_token: Option<String>,
) -> Result<Resolution, AppError> {
    if let Some(token) = access_token {
        match sessions.verify_access(&token) {
            Ok(claims) => return Ok(Resolution::Authenticated(Identity::from(claims))),
            Err(TokenError::Expired) => {}
            Err(e) => {
                tracing::warn!("Access token rejected: {}", e);
                return Err(AuthError::TokenInvalid.into());
            }
        }
    }

    match refresh_token {
        Some(token) => Ok(Resolution::Renewed(sessions.renew(&token).await?)),
        None => Ok(Resolution::Anonymous),
    }
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let access_token = cookie_value(&req, ACCESS_COOKIE);
        let refresh_token = cookie_value(&req, REFRESH_COOKIE);

        let service = self.service.clone();
        let sessions = self.sessions.clone();
        let cookies = self.cookies.clone();

        Box::pin(async move {
            let (identity, renewed_token) =
                match resolve_session(&sessions, access_token, refresh_token).await? {
                    Resolution::Anonymous => (Identity::anonymous(), None),
                    Resolution::Authenticated(identity) => (identity, None),
                    Resolution::Renewed(renewal) => {
                        tracing::info!(
                            user_id = ?renewal.identity.id,
                            "Access token renewed from refresh token"
                        );
                        (renewal.identity, Some(renewal.access.token))
                    }
                };

            req.extensions_mut().insert(identity);

            let mut res = service.call(req).await?;

            if let Some(token) = renewed_token {
                let handler_set_token = res
                    .response()
                    .cookies()
                    .any(|c| c.name() == ACCESS_COOKIE);
                if !handler_set_token {
                    res.response_mut()
                        .add_cookie(&cookies.access_cookie(&token))
                        .map_err(|e| AppError::Internal(e.to_string()))?;
                }
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, BcryptHasher, RefreshClaims, SecretHasher, TokenCodec};
    use crate::configuration::{AuthSettings, TokenSettings};
    use crate::domain::{NewUser, Role, UserStatus};
    use crate::store::{MemoryStore, UserStore};
    use actix_web::cookie::Cookie;
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use std::sync::Arc;

    const PASSWORD: &str = "SecurePass123";

    fn settings() -> AuthSettings {
        AuthSettings {
            issuer: "test".to_string(),
            hash_cost: 4,
            cookie_secure: false,
            access_token: TokenSettings {
                secret: "access-secret-key-at-least-32-characters".to_string(),
                ttl_seconds: 900,
            },
            refresh_token: TokenSettings {
                secret: "refresh-secret-key-at-least-32-characters".to_string(),
                ttl_seconds: 604800,
            },
        }
    }

    async fn sessions() -> web::Data<SessionManager> {
        let store = Arc::new(MemoryStore::new());
        let hasher = Arc::new(BcryptHasher::new(4));
        store
            .create_user(NewUser {
                email: "john@example.com".to_string(),
                name: "John Doe".to_string(),
                password_hash: hasher.hash(PASSWORD).unwrap(),
                role: Role::Editor,
                status: UserStatus::Active,
                image: None,
            })
            .await
            .unwrap();
        web::Data::new(SessionManager::new(store, hasher, &settings()).unwrap())
    }

    async fn whoami(identity: Identity) -> HttpResponse {
        HttpResponse::Ok().json(identity)
    }

    async fn protected(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.email)
    }

    async fn clears_token() -> HttpResponse {
        let policy = CookiePolicy::from_settings(&settings());
        HttpResponse::Ok().cookie(policy.removal(ACCESS_COOKIE)).finish()
    }

    macro_rules! app {
        ($sessions:expr) => {
            test::init_service(
                App::new().service(
                    web::scope("")
                        .wrap(SessionMiddleware::new(
                            $sessions.clone(),
                            CookiePolicy::from_settings(&settings()),
                        ))
                        .route("/whoami", web::get().to(whoami))
                        .route("/protected", web::get().to(protected))
                        .route("/clear", web::get().to(clears_token)),
                ),
            )
            .await
        };
    }

    fn renewed_token<B>(res: &ServiceResponse<B>) -> Option<String> {
        res.response()
            .cookies()
            .find(|c| c.name() == ACCESS_COOKIE)
            .map(|c| c.value().to_string())
    }

    #[actix_web::test]
    async fn test_no_cookies_is_anonymous() {
        let sessions = sessions().await;
        let app = app!(sessions);

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let identity: Identity = test::call_and_read_body_json(&app, req).await;
        assert!(identity.is_anonymous());

        let req = test::TestRequest::get().uri("/protected").to_request();
        let res = test::try_call_service(&app, req).await;
        let status = match res {
            Ok(res) => res.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_valid_access_token_attaches_claims() {
        let sessions = sessions().await;
        let outcome = sessions.login("john@example.com", PASSWORD, None).await.unwrap();
        let app = app!(sessions);

        let req = test::TestRequest::get()
            .uri("/protected")
            .cookie(Cookie::new(ACCESS_COOKIE, outcome.access.token))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert!(renewed_token(&res).is_none());
    }

    #[actix_web::test]
    async fn test_refresh_cookie_alone_renews() {
        let sessions = sessions().await;
        let outcome = sessions.login("john@example.com", PASSWORD, None).await.unwrap();
        let app = app!(sessions);

        let req = test::TestRequest::get()
            .uri("/protected")
            .cookie(Cookie::new(REFRESH_COOKIE, outcome.refresh.token))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        let token = renewed_token(&res).expect("renewed access cookie");
        let claims = sessions.verify_access(&token).unwrap();
        assert_eq!(claims.sub, outcome.user.id);
    }

    #[actix_web::test]
    async fn test_tampered_access_token_is_not_renewed() {
        let sessions = sessions().await;
        let outcome = sessions.login("john@example.com", PASSWORD, None).await.unwrap();
        let app = app!(sessions);

        let mut tampered = outcome.access.token.clone();
        tampered.push('x');
        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(ACCESS_COOKIE, tampered))
            .cookie(Cookie::new(REFRESH_COOKIE, outcome.refresh.token))
            .to_request();
        let err = test::try_call_service(&app, req).await.err().expect("rejected");

        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_expired_refresh_token_is_forbidden() {
        let sessions = sessions().await;
        let outcome = sessions.login("john@example.com", PASSWORD, None).await.unwrap();
        let app = app!(sessions);

        let stale = TokenCodec::<RefreshClaims>::new(
            &TokenSettings {
                secret: settings().refresh_token.secret,
                ttl_seconds: -60,
            },
            "test",
        );
        let expired = stale.sign(RefreshClaims::for_user(&outcome.user)).unwrap();

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(REFRESH_COOKIE, expired.token))
            .to_request();
        let err = test::try_call_service(&app, req).await.err().expect("rejected");

        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_handler_token_cookie_wins() {
        let sessions = sessions().await;
        let outcome = sessions.login("john@example.com", PASSWORD, None).await.unwrap();
        let app = app!(sessions);

        let req = test::TestRequest::get()
            .uri("/clear")
            .cookie(Cookie::new(REFRESH_COOKIE, outcome.refresh.token))
            .to_request();
        let res = test::call_service(&app, req).await;

        let tokens: Vec<_> = res
            .response()
            .cookies()
            .filter(|c| c.name() == ACCESS_COOKIE)
            .collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value(), "");
    }
}

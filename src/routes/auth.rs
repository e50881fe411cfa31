/// Authentication Routes
///
/// Handles signup, login, logout and current user information. Session
/// tokens only ever travel in httpOnly cookies.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatedUser, CookiePolicy, SessionManager, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::domain::UserResponse;
use crate::error::{AppError, ErrorContext};

/// User signup request
#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Success envelope shared by the auth endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub status: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &str, data: Option<T>) -> Self {
        Self {
            message: message.to_string(),
            status: "ok".to_string(),
            data,
        }
    }
}

/// POST /signup
///
/// Register a new account. It starts Pending and cannot log in until an
/// administrator activates it; no session is established here.
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn signup(
    form: web::Json<SignupRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_signup");

    let user = sessions
        .signup(&form.name, &form.email, &form.password)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User signed up"
    );

    Ok(HttpResponse::Created().json(ApiResponse::ok(
        "Signup successful",
        Some(UserResponse::from(user)),
    )))
}

/// POST /login
///
/// Authenticate with email and password. On success both session cookies
/// are set and the sanitized user is returned.
///
/// # Errors
/// - 400: Missing or malformed email/password
/// - 401: Invalid credentials (email not found or wrong password)
/// - 403: Account is suspended or pending
/// - 500: Internal server error
///
/// # Security Notes
/// - Uses same error message for "not found" and "wrong password"
/// - Prevents user enumeration attacks
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let client_ip = req.peer_addr().map(|addr| addr.ip().to_string());

    let outcome = sessions
        .login(&form.email, &form.password, client_ip)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %outcome.user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(cookies.access_cookie(&outcome.access.token))
        .cookie(cookies.refresh_cookie(&outcome.refresh.token))
        .json(ApiResponse::ok(
            "Login successful",
            Some(UserResponse::from(outcome.user)),
        )))
}

/// POST /logout
///
/// Revoke the caller's session and clear both cookies.
/// **Requires a session** (valid access token, or a refresh token the
/// session middleware renewed from).
///
/// # Errors
/// - 401: No session
/// - 500: Internal server error
pub async fn logout(
    user: AuthenticatedUser,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<CookiePolicy>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout").with_user_id(user.id);

    if let Err(e) = sessions.logout(user.id).await {
        context.log_error(&e);
        return Err(e);
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged out"
    );

    Ok(HttpResponse::Ok()
        .cookie(cookies.removal(ACCESS_COOKIE))
        .cookie(cookies.removal(REFRESH_COOKIE))
        .json(ApiResponse::<()>::ok("Logout successful", None)))
}

/// GET /me
///
/// Current user's profile, loaded fresh from the store.
///
/// # Errors
/// - 401: No session, or the user no longer exists
/// - 500: Internal server error
pub async fn get_current_user(
    user: AuthenticatedUser,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let user = sessions.current_user(user.id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok("ok", Some(UserResponse::from(user)))))
}

use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::{CookiePolicy, SessionManager};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::SessionMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, signup};

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    cookies: CookiePolicy,
) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(sessions);
    let cookies_data = web::Data::new(cookies.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())      // Standard logging
            .wrap(LoggerMiddleware)       // Structured request logging

            // Shared state
            .app_data(sessions.clone())
            .app_data(cookies_data.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::from(ValidationError::MalformedBody(err.to_string())).into()
            }))

            // Public routes (no session required)
            .route("/health_check", web::get().to(health_check))
            .route("/signup", web::post().to(signup))
            .route("/login", web::post().to(login))

            // Session routes (identity resolved and renewed by the middleware).
            // Wrapped per resource so unmatched paths never touch the session.
            .service(
                web::resource("/logout")
                    .wrap(SessionMiddleware::new(sessions.clone(), cookies.clone()))
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/me")
                    .wrap(SessionMiddleware::new(sessions.clone(), cookies.clone()))
                    .route(web::get().to(get_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

//! Integration tests for the public endpoints of the auth server

use newsdesk_auth::auth::{BcryptHasher, CookiePolicy, SessionManager};
use newsdesk_auth::configuration::get_configuration;
use newsdesk_auth::startup::run;
use newsdesk_auth::store::MemoryStore;
use std::net::TcpListener;
use std::sync::Arc;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let configuration = get_configuration().expect("Failed to read configuration.");
    let sessions = SessionManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(BcryptHasher::new(4)),
        &configuration.auth,
    )
    .expect("Failed to build session manager");
    let server = run(
        listener,
        sessions,
        CookiePolicy::from_settings(&configuration.auth),
    )
    .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn me_without_session_returns_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/me", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn unknown_route_ignores_session_cookies() {
    let addr = spawn_app();

    let test_cases = vec![
        ("token=not.a.jwt", "tampered access cookie"),
        ("refreshToken=not.a.jwt", "refresh cookie"),
    ];

    for (cookie, description) in test_cases {
        let response = reqwest::Client::new()
            .get(&format!("{}/does-not-exist", addr))
            .header("Cookie", cookie)
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(
            404,
            response.status().as_u16(),
            "The API did not return 404 with a {}",
            description
        );
        assert!(
            response.headers().get("set-cookie").is_none(),
            "Unexpected cookie with a {}",
            description
        );
    }
}

use newsdesk_auth::auth::{BcryptHasher, CookiePolicy, SessionManager};
use newsdesk_auth::configuration::get_configuration;
use newsdesk_auth::startup::run;
use newsdesk_auth::store::{MemoryStore, PgStore, SessionStore};
use newsdesk_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = configuration.auth.validate() {
        tracing::error!("Invalid auth configuration: {}", e);
        return Err(startup_error(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let store: Arc<dyn SessionStore> = if configuration.application.in_memory_store {
        tracing::warn!("Using in-memory store; sessions and users are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&configuration.database.connection_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                startup_error(
                    std::io::ErrorKind::ConnectionRefused,
                    "Database connection error",
                )
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                startup_error(std::io::ErrorKind::Other, "Database migration error")
            })?;

        tracing::info!("Database connection pool created successfully");
        Arc::new(PgStore::new(pool))
    };

    let hasher = Arc::new(BcryptHasher::new(configuration.auth.hash_cost));
    let sessions = SessionManager::new(store, hasher, &configuration.auth).map_err(|e| {
        tracing::error!("Failed to build session manager: {}", e);
        startup_error(std::io::ErrorKind::Other, "Session manager error")
    })?;
    let cookies = CookiePolicy::from_settings(&configuration.auth);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, sessions, cookies)?;
    tracing::info!("Server started successfully");

    server.await
}

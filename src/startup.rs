use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, PasswordHasher, TokenIssuer, TokenVerifier};
use crate::configuration::{Settings, StoreBackend};
use crate::error::StoreError;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtGuard;
use crate::routes::{health_check, logout, refresh, sign_in, sign_up};
use crate::store::{InMemoryUserStore, PostgresUserStore, UserStore};

const MAX_JSON_PAYLOAD: usize = 4096;

/// Wire the orchestrator and the guard's verifier from settings
pub fn build_auth(settings: &Settings, store: Arc<dyn UserStore>) -> (AuthService, TokenVerifier) {
    let service = AuthService::new(
        store,
        PasswordHasher::new(settings.hashing.cost),
        TokenIssuer::new(&settings.jwt),
    );
    (service, TokenVerifier::new(&settings.jwt))
}

/// Open the configured user store, running migrations for Postgres
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn UserStore>, StoreError> {
    match settings.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory user store; accounts are lost on restart");
            Ok(Arc::new(InMemoryUserStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&settings.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to create connection pool");
                    StoreError::from(e)
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to migrate the database");
                StoreError::Unavailable(format!("migration failed: {}", e))
            })?;

            tracing::info!("Database connection pool created successfully");
            Ok(Arc::new(PostgresUserStore::new(pool)))
        }
    }
}

pub fn run(
    listener: TcpListener,
    service: AuthService,
    verifier: TokenVerifier,
) -> Result<Server, std::io::Error> {
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(service.clone())
            .app_data(web::JsonConfig::default().limit(MAX_JSON_PAYLOAD))
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/local/signup", web::post().to(sign_up))
                    .route("/local/signin", web::post().to(sign_in))
                    .service(
                        web::resource("/logout")
                            .route(web::post().to(logout))
                            .wrap(JwtGuard::access(verifier.clone())),
                    )
                    .service(
                        web::resource("/refresh")
                            .route(web::post().to(refresh))
                            .wrap(JwtGuard::refresh(verifier.clone())),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

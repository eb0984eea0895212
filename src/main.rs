// src/main.rs

use std::{net::SocketAddr, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use exam_backend::{config::Config, create_router, error::AppError, state::AppState, utils::crypto};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "exam-backend.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let pool = connect_with_retry(&config.database_url).await;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    let state = AppState {
        pool,
        config,
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app)
        .await
        .expect("Server error");
}

/// The database container may still be starting; retry a few times before
/// giving up.
async fn connect_with_retry(database_url: &str) -> PgPool {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Connected to database");
                return pool;
            }
            Err(e) if attempts < 5 => {
                tracing::warn!("Database connection failed (attempt {}): {}", attempts, e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(e) => panic!("Failed to connect to database after {} attempts: {}", attempts, e),
        }
    }
}

/// Creates the bootstrap admin account on first start, when configured.
/// Admins cannot be created through the API, so this is the only way in.
async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let encrypted = crypto::encrypt_password(&config.password_secret, password)?;

    sqlx::query(
        "INSERT INTO users (username, password, full_name, role, status)
         VALUES ($1, $2, 'Administrator', 'ADMIN', 'ACTIVE')",
    )
    .bind(username)
    .bind(&encrypted)
    .execute(pool)
    .await?;

    tracing::info!("Seeded admin user '{}'", username);
    Ok(())
}

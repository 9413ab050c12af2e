use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventpass_server::config::Config;
use eventpass_server::notify::build_notifier;
use eventpass_server::payment::build_adapter;
use eventpass_server::routes::create_routes;
use eventpass_server::store::PgStore;
use eventpass_server::{AppState, Settings};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("eventpass_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let payments = build_adapter(&config).expect("Failed to configure payment gateway");
    let notifier = build_notifier(&config).expect("Failed to configure ticket email");

    let state = AppState::new(
        Arc::new(PgStore::new(pool)),
        payments,
        notifier,
        Settings::from(&config),
    );
    let app = create_routes(state);

    tracing::info!("Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}

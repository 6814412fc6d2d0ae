use lending_library::{
    adapters::{
        identity::{HmacTokenService, LibrarianAccount},
        memory::InMemoryEntityStore,
        postgres::PostgresEntityStore,
    },
    api::{handlers::AppState, router::create_router},
    application::ServiceDependencies,
    config::AppConfig,
    ports::EntityStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lending_library=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Initialize the entity store
    let store: Arc<dyn EntityStore> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Using PostgreSQL entity store");
            Arc::new(PostgresEntityStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, data will be kept in memory only");
            Arc::new(InMemoryEntityStore::new())
        }
    };

    // Initialize the identity service
    let secret = match &config.token_secret {
        Some(secret) => secret.as_bytes().to_vec(),
        None => {
            tracing::warn!("TOKEN_SECRET is not set, tokens will not survive a restart");
            [uuid::Uuid::new_v4(), uuid::Uuid::new_v4()]
                .iter()
                .flat_map(|id| id.into_bytes())
                .collect()
        }
    };
    if config.uses_default_password() {
        tracing::warn!(
            username = %config.librarian_username,
            "Librarian account is using the default password"
        );
    }
    let identity = HmacTokenService::new(
        &secret,
        chrono::Duration::hours(config.token_ttl_hours),
        LibrarianAccount {
            username: config.librarian_username.clone(),
            password: config.librarian_password.clone(),
            name: config.librarian_name.clone(),
        },
    )
    .expect("Failed to initialize token service");

    // Create application state
    let app_state = Arc::new(AppState {
        service_deps: ServiceDependencies::new(store),
        identity: Arc::new(identity),
    });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

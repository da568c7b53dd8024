use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod collection;
mod colors;
mod error;
mod geocoding;
mod images;
mod local_store;
mod markers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;
mod sweeper;
mod validation;

use common::database::{DatabaseConfig, init_pool};

use crate::{
    colors::FriendColors,
    geocoding::{GeocodingClient, GeocodingConfig, SuggestionSessions},
    markers::MarkerRegistry,
    middleware::JwtVerifier,
    repositories::FriendRepository,
    repositories::pin::PinRepository,
    state::AppState,
    sweeper::ExpirationSweeper,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Spoty service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize the geocoding cache and client
    let redis_config = common::cache::RedisConfig::from_env()?;
    let redis_pool = common::cache::RedisPool::new(&redis_config).await?;
    let geocoding_config = GeocodingConfig::from_env()?;
    let geocoder = GeocodingClient::new(geocoding_config, redis_pool)?;

    // Prepare the token verifier once; requests only run the signature check
    let jwt = JwtVerifier::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Initialize repositories
    let pin_repository = PinRepository::new(pool.clone());
    let friend_repository = FriendRepository::new(pool.clone());

    // One-time migration of a legacy client-side pin file, if configured
    if let Ok(path) = std::env::var("LEGACY_PINS_FILE") {
        migrate_legacy_pins(&path, &pin_repository).await;
    }

    // Start the background expiration sweep
    let schedule = std::env::var("EXPIRY_SWEEP_SCHEDULE")
        .unwrap_or_else(|_| "0 */10 * * * *".to_string());
    let sweeper = ExpirationSweeper::new(pin_repository.clone());
    sweeper.start(&schedule).await?;

    info!("Spoty service initialized successfully");

    let app_state = AppState {
        db_pool: pool,
        pin_repository,
        friend_repository,
        geocoder,
        jwt,
        suggestions: SuggestionSessions::new(),
        markers: Arc::new(Mutex::new(MarkerRegistry::new())),
        friend_colors: Arc::new(Mutex::new(FriendColors::new())),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Spoty service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Import pins from the legacy local-file store into the gateway
///
/// Legacy records carry no owner; `LEGACY_PINS_OWNER` names the account
/// they are imported under. The file is cleared once imported so the
/// migration runs at most once.
async fn migrate_legacy_pins(path: &str, pins: &PinRepository) {
    let owner = match std::env::var("LEGACY_PINS_OWNER")
        .ok()
        .and_then(|raw| raw.parse().ok())
    {
        Some(owner) => owner,
        None => {
            tracing::warn!("LEGACY_PINS_FILE set but LEGACY_PINS_OWNER missing; skipping import");
            return;
        }
    };

    let store = local_store::LocalPinStore::new(path);
    let legacy = store.load();
    if legacy.is_empty() {
        return;
    }

    let mut imported = 0usize;
    for mut pin in legacy {
        pin.id = None;
        pin.owner_id = owner;
        match pins.create(&pin).await {
            Ok(_) => imported += 1,
            Err(e) => tracing::error!("Failed to import legacy pin '{}': {}", pin.name, e),
        }
    }
    info!("Imported {} legacy pins from {}", imported, path);

    if let Err(e) = store.save(&[]) {
        tracing::error!("Failed to clear legacy pin file {}: {}", path, e);
    }
}

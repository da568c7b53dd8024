//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::colors::FriendColors;
use crate::geocoding::{GeocodingClient, SuggestionSessions};
use crate::markers::MarkerRegistry;
use crate::middleware::JwtVerifier;
use crate::repositories::FriendRepository;
use crate::repositories::pin::PinRepository;

/// Application state shared across handlers
///
/// The marker registry and color assignments live for the session; the
/// registry is rebuilt from storage whenever the map view is served.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub pin_repository: PinRepository,
    pub friend_repository: FriendRepository,
    pub geocoder: GeocodingClient,
    pub jwt: JwtVerifier,
    pub suggestions: SuggestionSessions,
    pub markers: Arc<Mutex<MarkerRegistry>>,
    pub friend_colors: Arc<Mutex<FriendColors>>,
}

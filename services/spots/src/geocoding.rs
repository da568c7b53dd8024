//! Geocoding client for address search and reverse lookup
//!
//! Wraps the Nominatim HTTP API. The provider is rate-sensitive, so
//! every successful lookup is cached in Redis with a TTL and repeat
//! requests are served from cache. Address suggestions additionally go
//! through a [`SuggestionSession`]: a lookup superseded by a newer one
//! has its result discarded instead of being delivered stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use common::cache::{GEOCODE_TTL_SECONDS, RedisPool};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::markers::LocationKey;

/// A ranked geocoding match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeMatch {
    pub display_name: String,
    pub lat: f64,
    pub lng: f64,
}

/// Nominatim search/reverse payload item (coordinates come as strings)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl From<NominatimPlace> for GeocodeMatch {
    fn from(place: NominatimPlace) -> Self {
        GeocodeMatch {
            display_name: place.display_name,
            // malformed coordinates degrade to 0, they never error
            lat: place.lat.parse().unwrap_or(0.0),
            lng: place.lon.parse().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

/// Geocoding configuration
#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    /// Base URL of the Nominatim endpoint
    pub base_url: String,
    /// User-Agent sent with every request, as the provider requires
    pub user_agent: String,
    /// Number of ranked matches requested per search
    pub search_limit: u8,
}

impl GeocodingConfig {
    /// Create a new GeocodingConfig from environment variables
    ///
    /// # Environment Variables
    /// - `NOMINATIM_URL`: endpoint base (default: "https://nominatim.openstreetmap.org")
    /// - `NOMINATIM_USER_AGENT`: User-Agent header (default: "spoty")
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());
        let user_agent =
            std::env::var("NOMINATIM_USER_AGENT").unwrap_or_else(|_| "spoty".to_string());

        Ok(GeocodingConfig {
            base_url,
            user_agent,
            search_limit: 5,
        })
    }
}

/// Client for the geocoding capability
#[derive(Clone)]
pub struct GeocodingClient {
    http: reqwest::Client,
    config: GeocodingConfig,
    cache: RedisPool,
}

impl GeocodingClient {
    pub fn new(config: GeocodingConfig, cache: RedisPool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(GeocodingClient {
            http,
            config,
            cache,
        })
    }

    /// Search for an address, returning zero or more ranked matches
    ///
    /// An empty result is not an error. Cache failures degrade to a
    /// live lookup.
    pub async fn search(&self, text: &str) -> Result<Vec<GeocodeMatch>> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let cache_key = format!("geocode:search:{}", query.to_lowercase());
        match self.cache.get_json::<Vec<GeocodeMatch>>(&cache_key).await {
            Ok(Some(hit)) => {
                debug!("Geocode cache hit for '{}'", query);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!("Geocode cache read failed: {}", e),
        }

        let url = format!("{}/search", self.config.base_url);
        let places: Vec<NominatimPlace> = self
            .http
            .get(&url)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("addressdetails", "1"),
                ("limit", &self.config.search_limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let matches: Vec<GeocodeMatch> = places.into_iter().map(GeocodeMatch::from).collect();

        if let Err(e) = self
            .cache
            .set_json(&cache_key, &matches, Some(GEOCODE_TTL_SECONDS))
            .await
        {
            warn!("Geocode cache write failed: {}", e);
        }

        Ok(matches)
    }

    /// Reverse-geocode a coordinate to a human-readable address
    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        let cache_key = format!("geocode:reverse:{}", LocationKey::new(lat, lng));
        match self.cache.get_json::<String>(&cache_key).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => {}
            Err(e) => warn!("Geocode cache read failed: {}", e),
        }

        let url = format!("{}/reverse", self.config.base_url);
        let place: NominatimReverse = self
            .http
            .get(&url)
            .query(&[
                ("format", "jsonv2"),
                ("lat", &lat.to_string()),
                ("lon", &lng.to_string()),
                ("addressdetails", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(name) = &place.display_name {
            if let Err(e) = self
                .cache
                .set_json(&cache_key, name, Some(GEOCODE_TTL_SECONDS))
                .await
            {
                warn!("Geocode cache write failed: {}", e);
            }
        }

        Ok(place.display_name)
    }
}

/// Supersede tracking for one client's address suggestions
///
/// Each keystroke starts a new lookup generation; when a lookup
/// finishes after a newer one has started, its result is dropped.
/// This is the only cancellation path in the system. Sessions are
/// per client: one caller's keystrokes never supersede another's
/// lookups (see [`SuggestionSessions`]).
#[derive(Debug, Clone, Default)]
pub struct SuggestionSession {
    generation: Arc<AtomicU64>,
}

impl SuggestionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new lookup generation
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` is still the latest lookup
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Run a suggestion search; `None` means the lookup was superseded
    pub async fn suggest(
        &self,
        client: &GeocodingClient,
        text: &str,
    ) -> Result<Option<Vec<GeocodeMatch>>> {
        let generation = self.begin();
        let matches = client.search(text).await?;
        if self.is_current(generation) {
            Ok(Some(matches))
        } else {
            debug!("Discarding superseded suggestion lookup for '{}'", text);
            Ok(None)
        }
    }
}

/// Registry of suggestion sessions, keyed by a client-supplied token
///
/// Independent clients get independent generation counters, so only a
/// client's own newer keystroke can cancel its in-flight lookup.
#[derive(Debug, Clone, Default)]
pub struct SuggestionSessions {
    sessions: Arc<tokio::sync::Mutex<HashMap<String, SuggestionSession>>>,
}

impl SuggestionSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for a client token, created on first sight
    pub async fn session(&self, key: &str) -> SuggestionSession {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(key.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_geocoding_config_from_env() {
        unsafe {
            std::env::set_var("NOMINATIM_URL", "http://localhost:8088");
            std::env::set_var("NOMINATIM_USER_AGENT", "spoty-test");
        }

        let config = GeocodingConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://localhost:8088");
        assert_eq!(config.user_agent, "spoty-test");
        assert_eq!(config.search_limit, 5);

        // Clean up
        unsafe {
            std::env::remove_var("NOMINATIM_URL");
            std::env::remove_var("NOMINATIM_USER_AGENT");
        }
    }

    #[test]
    #[serial]
    fn test_geocoding_config_defaults() {
        unsafe {
            std::env::remove_var("NOMINATIM_URL");
            std::env::remove_var("NOMINATIM_USER_AGENT");
        }

        let config = GeocodingConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://nominatim.openstreetmap.org");
        assert_eq!(config.user_agent, "spoty");
    }

    #[test]
    fn nominatim_search_payload_parses() {
        let payload = r#"[
            {"display_name": "Joe's Coffee, 1 Main St, New York", "lat": "40.7128", "lon": "-74.0060"},
            {"display_name": "Joe's Coffee, Brooklyn", "lat": "40.6782", "lon": "-73.9442"}
        ]"#;

        let places: Vec<NominatimPlace> = serde_json::from_str(payload).unwrap();
        let matches: Vec<GeocodeMatch> = places.into_iter().map(GeocodeMatch::from).collect();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].lat, 40.7128);
        assert_eq!(matches[0].lng, -74.006);
        assert!(matches[0].display_name.starts_with("Joe's Coffee"));
    }

    #[test]
    fn malformed_coordinates_degrade_to_zero() {
        let payload = r#"[{"display_name": "nowhere", "lat": "not-a-number", "lon": ""}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(payload).unwrap();
        let m = GeocodeMatch::from(places.into_iter().next().unwrap());
        assert_eq!(m.lat, 0.0);
        assert_eq!(m.lng, 0.0);
    }

    #[test]
    fn reverse_payload_without_result_parses_as_none() {
        let payload = r#"{"error": "Unable to geocode"}"#;
        let place: NominatimReverse = serde_json::from_str(payload).unwrap();
        assert!(place.display_name.is_none());
    }

    #[test]
    fn newer_generation_supersedes_older() {
        let session = SuggestionSession::new();
        let first = session.begin();
        let second = session.begin();

        assert!(!session.is_current(first));
        assert!(session.is_current(second));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_client() {
        let sessions = SuggestionSessions::new();

        let alice = sessions.session("client-a").await;
        let in_flight = alice.begin();

        // another client's keystrokes must not cancel alice's lookup
        sessions.session("client-b").await.begin();
        sessions.session("client-b").await.begin();
        assert!(alice.is_current(in_flight));

        // only alice's own newer keystroke supersedes it
        sessions.session("client-a").await.begin();
        assert!(!alice.is_current(in_flight));
    }
}

//! API models for request and response payloads

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::{PinFilter, SortOption};
use crate::markers::{LocationKey, Marker};
use crate::models::pin::{Category, Pin};

pub mod pin;

/// Query parameters for pin listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PinListQuery {
    /// Restrict to one friend's pins
    pub friend: Option<Uuid>,
    /// Comma-separated category slugs; empty means no restriction
    pub categories: Option<String>,
    pub min_rating: Option<f32>,
    pub max_rating: Option<f32>,
    pub sort: Option<SortOption>,
    /// Top-10 mode: forces rating-descending order and truncates to 10
    pub top10: Option<bool>,
}

impl PinListQuery {
    /// Translate the query string into collection-engine inputs
    ///
    /// Unknown category slugs are dropped, not coerced; a selection of
    /// only unknown slugs degrades to "no restriction".
    pub fn to_filter(&self) -> PinFilter {
        let categories = self
            .categories
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter_map(Category::parse)
            .collect();

        PinFilter {
            friend: self.friend,
            categories,
            min_rating: self.min_rating.unwrap_or(0.0),
            max_rating: self.max_rating.unwrap_or(5.0),
        }
    }

    pub fn sort(&self) -> SortOption {
        self.sort.unwrap_or_default()
    }

    pub fn top10(&self) -> bool {
        self.top10.unwrap_or(false)
    }
}

/// Response for pin listing
#[derive(Debug, Serialize)]
pub struct PinListResponse {
    pub pins: Vec<Pin>,
    pub total: usize,
}

/// Response for the friends' pins view
#[derive(Debug, Serialize)]
pub struct FriendPinsResponse {
    pub pins: Vec<Pin>,
    /// Display color per friend identity
    pub colors: HashMap<Uuid, String>,
}

/// One reconciled marker in the map view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerView {
    pub key: LocationKey,
    #[serde(flatten)]
    pub marker: Marker,
}

/// Response for the map view
#[derive(Debug, Serialize)]
pub struct MapViewResponse {
    pub markers: Vec<MarkerView>,
}

/// Request for adding a friend by email
#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    pub email: String,
}

/// Query parameters for address search
#[derive(Debug, Deserialize)]
pub struct GeocodeSearchQuery {
    pub q: String,
    /// Client token scoping suggestion supersession to this caller
    #[serde(default)]
    pub session: Option<String>,
}

/// Query parameters for reverse geocoding
#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeQuery {
    pub lat: f64,
    pub lng: f64,
}

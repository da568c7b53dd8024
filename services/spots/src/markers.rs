//! Marker reconciliation
//!
//! Keeps a one-to-one mapping between a geographic location and the
//! marker shown for it, so repeated zoom/select actions on the same
//! spot update the existing marker instead of stacking duplicates.
//! The registry is an explicit service object owned by whoever owns
//! the map lifetime; there is no ambient global state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::models::pin::Pin;

/// Identity of a map location at 6-decimal resolution (~11 cm)
///
/// Two pins saved at close but not identical coordinates hash to
/// different keys and get distinct markers. Stored as micro-degree
/// integers so equality does not depend on float formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey {
    lat_e6: i64,
    lng_e6: i64,
}

impl LocationKey {
    pub fn new(lat: f64, lng: f64) -> Self {
        LocationKey {
            lat_e6: (lat * 1e6).round() as i64,
            lng_e6: (lng * 1e6).round() as i64,
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6},{:.6}",
            self.lat_e6 as f64 / 1e6,
            self.lng_e6 as f64 / 1e6
        )
    }
}

impl Serialize for LocationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Popup content attached to a marker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContent {
    pub name: String,
    pub rating: i16,
    /// First image of the pin, if any
    pub image: Option<String>,
    pub description: Option<String>,
}

/// A visual marker on the map layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub lat: f64,
    pub lng: f64,
    /// Category icon asset
    pub icon_url: String,
    /// Friend display color, when the pin belongs to a friend
    pub color: Option<String>,
    pub popup: PopupContent,
    pub popup_open: bool,
}

impl Marker {
    /// Derive the marker (and its location key) for a pin
    pub fn for_pin(pin: &Pin, color: Option<&str>) -> (LocationKey, Marker) {
        let key = LocationKey::new(pin.lat, pin.lng);
        let marker = Marker {
            lat: pin.lat,
            lng: pin.lng,
            icon_url: pin.category.icon_url(),
            color: color.map(|c| c.to_string()),
            popup: PopupContent {
                name: pin.name.clone(),
                rating: pin.rating,
                image: pin.images.first().cloned(),
                description: pin.description.clone(),
            },
            popup_open: false,
        };
        (key, marker)
    }
}

/// Registry guaranteeing at most one marker per location key
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    markers: HashMap<LocationKey, Marker>,
    /// Insertion order, for deterministic iteration
    order: Vec<LocationKey>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the marker for `key`
    ///
    /// An existing marker has its content updated in place and its
    /// popup opened; otherwise a new marker is registered with the
    /// popup attached but closed.
    pub fn upsert(&mut self, key: LocationKey, marker: Marker) -> &Marker {
        match self.markers.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                *existing = marker;
                existing.popup_open = true;
                entry.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                self.order.push(key);
                entry.insert(marker)
            }
        }
    }

    /// Open the popup of an existing marker
    ///
    /// A request against an unknown key is logged and swallowed; the
    /// map simply does not show a popup.
    pub fn open_popup(&mut self, key: LocationKey) -> bool {
        match self.markers.get_mut(&key) {
            Some(marker) => {
                marker.popup_open = true;
                true
            }
            None => {
                warn!("No marker registered at {} to open a popup for", key);
                false
            }
        }
    }

    /// Detach and forget the marker for `key`; no-op if absent
    pub fn remove(&mut self, key: LocationKey) -> Option<Marker> {
        let removed = self.markers.remove(&key);
        if removed.is_some() {
            self.order.retain(|k| *k != key);
        }
        removed
    }

    /// Rebuild from scratch by replaying `upsert` for every non-expired
    /// pin in storage order
    ///
    /// Each pin carries its display color: `None` for the viewer's own
    /// pins, the assigned friend color for a friend's.
    pub fn rebuild<'a, I>(&mut self, pins: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (&'a Pin, Option<&'a str>)>,
    {
        self.markers.clear();
        self.order.clear();
        for (pin, color) in pins {
            if pin.is_expired(now) {
                continue;
            }
            let (key, marker) = Marker::for_pin(pin, color);
            self.upsert(key, marker);
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, key: &LocationKey) -> Option<&Marker> {
        self.markers.get(key)
    }

    /// Markers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&LocationKey, &Marker)> {
        self.order.iter().filter_map(|k| self.markers.get(k).map(|m| (k, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pin::Category;
    use chrono::Duration;
    use uuid::Uuid;

    fn pin_at(name: &str, lat: f64, lng: f64) -> Pin {
        Pin {
            id: Some(Uuid::new_v4()),
            owner_id: Uuid::new_v4(),
            name: name.to_string(),
            address: "somewhere".to_string(),
            lat,
            lng,
            description: None,
            category: Category::FoodDrinks,
            rating: 4,
            images: Vec::new(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn upsert_is_idempotent_per_key() {
        let mut registry = MarkerRegistry::new();
        let pin = pin_at("Joe's", 40.7128, -74.006);

        let (key, marker) = Marker::for_pin(&pin, None);
        registry.upsert(key, marker);
        assert_eq!(registry.len(), 1);

        let mut renamed = pin.clone();
        renamed.name = "Joe's Coffee".to_string();
        let (key, marker) = Marker::for_pin(&renamed, None);
        let updated = registry.upsert(key, marker);

        assert_eq!(updated.popup.name, "Joe's Coffee");
        assert!(updated.popup_open, "second upsert reopens the popup");
        assert_eq!(registry.len(), 1, "no duplicate marker for the same key");
    }

    #[test]
    fn nearby_but_distinct_coordinates_get_distinct_markers() {
        let mut registry = MarkerRegistry::new();
        let a = pin_at("a", 40.712800, -74.006000);
        // differs at the 5th decimal, beyond key resolution
        let b = pin_at("b", 40.712810, -74.006000);

        let (ka, ma) = Marker::for_pin(&a, None);
        let (kb, mb) = Marker::for_pin(&b, None);
        registry.upsert(ka, ma);
        registry.upsert(kb, mb);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn sub_resolution_jitter_collapses_to_one_key() {
        // differs only past the 6th decimal: same spot
        let a = LocationKey::new(40.7128004, -74.0060004);
        let b = LocationKey::new(40.7128001, -74.0060001);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "40.712800,-74.006000");
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let mut registry = MarkerRegistry::new();
        let key = LocationKey::new(1.0, 2.0);
        assert!(registry.remove(key).is_none());

        let pin = pin_at("x", 1.0, 2.0);
        let (key, marker) = Marker::for_pin(&pin, None);
        registry.upsert(key, marker);
        assert!(registry.remove(key).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn popup_open_for_missing_marker_is_swallowed() {
        let mut registry = MarkerRegistry::new();
        assert!(!registry.open_popup(LocationKey::new(0.0, 0.0)));
    }

    #[test]
    fn rebuild_skips_expired_and_keeps_storage_order() {
        let now = Utc::now();
        let first = pin_at("first", 1.0, 1.0);
        let mut gone = pin_at("gone", 2.0, 2.0);
        gone.expires_at = Some(now - Duration::minutes(5));
        let last = pin_at("last", 3.0, 3.0);

        let mut registry = MarkerRegistry::new();
        registry.rebuild([(&first, None), (&gone, None), (&last, None)], now);

        let names: Vec<&str> = registry.iter().map(|(_, m)| m.popup.name.as_str()).collect();
        assert_eq!(names, vec!["first", "last"]);
    }

    #[test]
    fn rebuild_attaches_friend_colors() {
        let own = pin_at("mine", 1.0, 1.0);
        let theirs = pin_at("a friend's", 2.0, 2.0);

        let mut registry = MarkerRegistry::new();
        registry.rebuild([(&own, None), (&theirs, Some("#e74c3c"))], Utc::now());

        let colors: Vec<Option<&str>> = registry
            .iter()
            .map(|(_, m)| m.color.as_deref())
            .collect();
        assert_eq!(colors, vec![None, Some("#e74c3c")]);
    }
}

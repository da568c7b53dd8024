//! Pin model and form-to-record construction
//!
//! A pin (or "spot") is a user-owned point of interest. This module
//! defines the canonical record shape, the fixed category set, and the
//! builder that turns submitted form fields into a record ready for the
//! persistence gateway.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Name given to a pin saved with an empty name field
pub const UNTITLED_NAME: &str = "Untitled Spot";

/// Fixed category set for pins
///
/// Stored values outside this set deserialize to the default category,
/// which maps to the default marker appearance rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[default]
    FoodDrinks,
    Events,
    Activities,
    Nightlife,
    Shopping,
    Favorites,
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Category::parse_or_default(&value))
    }
}

impl Category {
    /// Stable string form, matching the stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FoodDrinks => "food-drinks",
            Category::Events => "events",
            Category::Activities => "activities",
            Category::Nightlife => "nightlife",
            Category::Shopping => "shopping",
            Category::Favorites => "favorites",
        }
    }

    /// Parse a category slug; `None` for anything outside the fixed set
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "food-drinks" => Some(Category::FoodDrinks),
            "events" => Some(Category::Events),
            "activities" => Some(Category::Activities),
            "nightlife" => Some(Category::Nightlife),
            "shopping" => Some(Category::Shopping),
            "favorites" => Some(Category::Favorites),
            _ => None,
        }
    }

    /// Parse a stored category value, falling back to the default
    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }

    /// Marker icon asset for this category
    pub fn icon_url(&self) -> String {
        format!("/pics/{}.png", self.as_str())
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::FoodDrinks => "Food and drinks",
            Category::Events => "Events",
            Category::Activities => "Activities",
            Category::Nightlife => "Nightlife",
            Category::Shopping => "Shopping",
            Category::Favorites => "Favorites",
        }
    }
}

/// A user-owned point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    /// Assigned by the persistence gateway on creation; `None` until saved
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Identity of the creating user; immutable after creation
    #[serde(default)]
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// 1-5; legacy records missing the field read back as 0
    #[serde(default)]
    pub rating: i16,
    /// Inline-encoded image payloads, at most [`crate::images::MAX_IMAGES`]
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Pin {
    /// Whether the pin is past its expiration timestamp
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Expiration input, one of three mutually exclusive modes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ExpiresIn {
    /// Relative: a number of hours from now
    Hours(i64),
    /// Relative: a number of days from now
    Days(i64),
    /// Absolute date-time
    At(DateTime<Utc>),
}

impl ExpiresIn {
    fn resolve(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ExpiresIn::Hours(h) => now + Duration::hours(h),
            ExpiresIn::Days(d) => now + Duration::days(d),
            ExpiresIn::At(at) => at,
        }
    }
}

/// Validation failures that block a pin submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinValidationError {
    #[error("Address is required")]
    EmptyAddress,

    #[error("A location on the map is required")]
    MissingCoordinates,
}

/// Submitted form fields for creating or editing a pin
///
/// Every field is optional; missing optional fields fall back to
/// defaults (or to the existing record when editing) rather than
/// erroring. The hard requirements are a non-empty address and a
/// resolved coordinate pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// Accepted as a float from the star control, coerced to an integer
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Already-encoded image payloads from the encode step
    #[serde(default)]
    pub images: Vec<String>,
    /// `None` when the "temporary" toggle is off
    #[serde(default)]
    pub expires: Option<ExpiresIn>,
}

impl PinForm {
    /// Start a form from a map click, with the address synthesized from
    /// the coordinates until a reverse lookup replaces it
    pub fn from_map_click(lat: f64, lng: f64) -> Self {
        PinForm {
            address: Some(format!("{:.5}, {:.5}", lat, lng)),
            lat: Some(lat),
            lng: Some(lng),
            ..Default::default()
        }
    }

    /// Build the record submitted to the persistence gateway
    ///
    /// When `existing` is given the form is merged over it, preserving
    /// `id`, `owner_id`, and `created_at`. Rating is coerced to an
    /// integer and clamped to 1-5; a new pin with no rating starts at 5.
    pub fn build(
        self,
        owner_id: Uuid,
        existing: Option<&Pin>,
        now: DateTime<Utc>,
    ) -> Result<Pin, PinValidationError> {
        let lat = self
            .lat
            .or(existing.map(|p| p.lat))
            .ok_or(PinValidationError::MissingCoordinates)?;
        let lng = self
            .lng
            .or(existing.map(|p| p.lng))
            .ok_or(PinValidationError::MissingCoordinates)?;
        if !lat.is_finite() || !lng.is_finite() {
            return Err(PinValidationError::MissingCoordinates);
        }

        let address = self
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or(PinValidationError::EmptyAddress)?;

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNTITLED_NAME.to_string());

        let rating = self
            .rating
            .map(|r| (r.round() as i16).clamp(1, 5))
            .or(existing.map(|p| p.rating).filter(|r| *r > 0))
            .unwrap_or(5);

        let category = self
            .category
            .or(existing.map(|p| p.category))
            .unwrap_or_default();

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut images = self.images;
        images.truncate(crate::images::MAX_IMAGES);

        Ok(Pin {
            id: existing.and_then(|p| p.id),
            owner_id: existing.map(|p| p.owner_id).unwrap_or(owner_id),
            name,
            address,
            lat,
            lng,
            description,
            category,
            rating,
            images,
            created_at: existing.map(|p| p.created_at).unwrap_or(now),
            expires_at: self.expires.map(|e| e.resolve(now)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn build_defaults_name_and_rating() {
        let form = PinForm {
            address: Some("1 Main St".to_string()),
            lat: Some(40.7128),
            lng: Some(-74.006),
            ..Default::default()
        };
        let pin = form.build(owner(), None, Utc::now()).unwrap();
        assert_eq!(pin.name, "Untitled Spot");
        assert_eq!(pin.rating, 5);
        assert_eq!(pin.category, Category::FoodDrinks);
        assert!(pin.id.is_none());
        assert!(pin.expires_at.is_none());
    }

    #[test]
    fn build_rejects_empty_address() {
        let form = PinForm {
            address: Some("   ".to_string()),
            lat: Some(1.0),
            lng: Some(2.0),
            ..Default::default()
        };
        assert_eq!(
            form.build(owner(), None, Utc::now()),
            Err(PinValidationError::EmptyAddress)
        );
    }

    #[test]
    fn build_rejects_missing_coordinates() {
        let form = PinForm {
            address: Some("1 Main St".to_string()),
            ..Default::default()
        };
        assert_eq!(
            form.build(owner(), None, Utc::now()),
            Err(PinValidationError::MissingCoordinates)
        );
    }

    #[test]
    fn build_coerces_and_clamps_rating() {
        let base = PinForm {
            address: Some("1 Main St".to_string()),
            lat: Some(1.0),
            lng: Some(2.0),
            ..Default::default()
        };

        let mut form = base.clone();
        form.rating = Some(3.6);
        assert_eq!(form.build(owner(), None, Utc::now()).unwrap().rating, 4);

        let mut form = base.clone();
        form.rating = Some(9.0);
        assert_eq!(form.build(owner(), None, Utc::now()).unwrap().rating, 5);

        let mut form = base;
        form.rating = Some(-2.0);
        assert_eq!(form.build(owner(), None, Utc::now()).unwrap().rating, 1);
    }

    #[test]
    fn build_preserves_identity_on_edit() {
        let creator = owner();
        let now = Utc::now();
        let first = PinForm {
            name: Some("Joe's Coffee".to_string()),
            address: Some("1 Main St".to_string()),
            lat: Some(40.7128),
            lng: Some(-74.006),
            rating: Some(3.0),
            ..Default::default()
        };
        let mut saved = first.build(creator, None, now).unwrap();
        saved.id = Some(Uuid::new_v4());

        let later = now + Duration::hours(2);
        let edit = PinForm {
            name: Some("Joe's Coffee Roasters".to_string()),
            address: Some("1 Main St".to_string()),
            lat: Some(40.7128),
            lng: Some(-74.006),
            ..Default::default()
        };
        let edited = edit.build(Uuid::new_v4(), Some(&saved), later).unwrap();

        assert_eq!(edited.id, saved.id);
        assert_eq!(edited.owner_id, creator);
        assert_eq!(edited.created_at, now);
        assert_eq!(edited.name, "Joe's Coffee Roasters");
        // rating carried over from the existing record
        assert_eq!(edited.rating, 3);
    }

    #[test]
    fn build_computes_expiry_modes() {
        let now = Utc::now();
        let base = PinForm {
            address: Some("1 Main St".to_string()),
            lat: Some(1.0),
            lng: Some(2.0),
            ..Default::default()
        };

        let mut form = base.clone();
        form.expires = Some(ExpiresIn::Hours(6));
        let pin = form.build(owner(), None, now).unwrap();
        assert_eq!(pin.expires_at, Some(now + Duration::hours(6)));

        let mut form = base.clone();
        form.expires = Some(ExpiresIn::Days(2));
        let pin = form.build(owner(), None, now).unwrap();
        assert_eq!(pin.expires_at, Some(now + Duration::days(2)));

        let at = now + Duration::days(30);
        let mut form = base;
        form.expires = Some(ExpiresIn::At(at));
        let pin = form.build(owner(), None, now).unwrap();
        assert_eq!(pin.expires_at, Some(at));
    }

    #[test]
    fn map_click_synthesizes_address() {
        let form = PinForm::from_map_click(40.7128, -74.006);
        assert_eq!(form.address.as_deref(), Some("40.71280, -74.00600"));
        let pin = form.build(owner(), None, Utc::now()).unwrap();
        assert_eq!(pin.address, "40.71280, -74.00600");
    }

    #[test]
    fn unknown_category_falls_back_to_default() {
        let parsed: Category = serde_json::from_str("\"bathrooms\"").unwrap();
        assert_eq!(parsed, Category::FoodDrinks);
        assert_eq!(Category::parse_or_default("nightlife"), Category::Nightlife);
        assert_eq!(Category::parse_or_default("??"), Category::FoodDrinks);
    }

    #[test]
    fn expired_predicate_uses_now() {
        let now = Utc::now();
        let mut pin = PinForm::from_map_click(1.0, 2.0)
            .build(owner(), None, now)
            .unwrap();
        assert!(!pin.is_expired(now));

        pin.expires_at = Some(now - Duration::hours(1));
        assert!(pin.is_expired(now));

        // boundary: expires_at == now counts as expired
        pin.expires_at = Some(now);
        assert!(pin.is_expired(now));
    }
}

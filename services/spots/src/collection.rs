//! Pin collection engine
//!
//! Derives the exact set and order of pins to display from a raw
//! collection, the active filters, and a sort mode. The pipeline is a
//! pure function of its inputs: expiration sweep, friend filter,
//! category filter, rating range, then sort. It never errors; missing
//! numeric data compares as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::pin::{Category, Pin};

/// Number of results kept in Top-10 mode
pub const TOP_N: usize = 10;

/// Sort modes offered by the card list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Creation time, newest first
    #[default]
    Newest,
    /// Rating descending, ties kept in input order
    RatingHigh,
    /// Rating ascending, ties kept in input order
    RatingLow,
    /// Name ascending, case-insensitive
    Name,
}

/// Active filters applied before sorting
#[derive(Debug, Clone)]
pub struct PinFilter {
    /// Restrict to a single friend's pins
    pub friend: Option<Uuid>,
    /// Empty selection means no category restriction
    pub categories: Vec<Category>,
    pub min_rating: f32,
    pub max_rating: f32,
}

impl Default for PinFilter {
    fn default() -> Self {
        PinFilter {
            friend: None,
            categories: Vec::new(),
            min_rating: 0.0,
            max_rating: 5.0,
        }
    }
}

impl PinFilter {
    fn passes(&self, pin: &Pin) -> bool {
        if let Some(friend) = self.friend {
            if pin.owner_id != friend {
                return false;
            }
        }

        if !self.categories.is_empty() && !self.categories.contains(&pin.category) {
            return false;
        }

        let rating = pin.rating.max(0) as f32;
        rating >= self.min_rating && rating <= self.max_rating
    }
}

/// Output of the pipeline: the displayable set plus the pins swept out
/// by expiration, which the caller deletes from storage best-effort
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub visible: Vec<Pin>,
    pub expired: Vec<Pin>,
}

/// Run the filter -> sort -> top-N pipeline
///
/// Top-10 mode forces rating-descending order regardless of the
/// selected sort and truncates after sorting, never before.
pub fn visible_pins(
    pins: Vec<Pin>,
    filter: &PinFilter,
    sort: SortOption,
    show_top10: bool,
    now: DateTime<Utc>,
) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    for pin in pins {
        if pin.is_expired(now) {
            outcome.expired.push(pin);
        } else if filter.passes(&pin) {
            outcome.visible.push(pin);
        }
    }

    let effective_sort = if show_top10 {
        SortOption::RatingHigh
    } else {
        sort
    };

    match effective_sort {
        SortOption::Newest => outcome
            .visible
            .sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOption::RatingHigh => outcome.visible.sort_by(|a, b| b.rating.cmp(&a.rating)),
        SortOption::RatingLow => outcome.visible.sort_by(|a, b| a.rating.cmp(&b.rating)),
        SortOption::Name => outcome
            .visible
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
    }

    if show_top10 {
        outcome.visible.truncate(TOP_N);
    }

    outcome
}
